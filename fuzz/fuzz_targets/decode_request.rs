#![no_main]
use clusterrpc_broker::RPCRequest;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(req) = RPCRequest::from_bytes(data) {
        let mut buf = Vec::new();
        req.serialise_into(&mut buf).expect("should be able to serialise");
        let got2 = RPCRequest::from_bytes(&buf).expect("must be valid");
        assert_eq!(req, got2);
    }
});
