#![no_main]
use clusterrpc_broker::RPCResponse;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(resp) = RPCResponse::from_bytes(data) {
        let mut buf = Vec::new();
        resp.serialise_into(&mut buf).expect("should be able to serialise");
        let got2 = RPCResponse::from_bytes(&buf).expect("must be valid");
        assert_eq!(resp, got2);
    }
});
