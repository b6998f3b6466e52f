use std::io::Cursor;

use clusterrpc_broker::{RPCRequest, RPCResponse, Status, TraceInfo};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sample_request() -> RPCRequest {
    RPCRequest {
        rpc_id: "bench-rpc-id".into(),
        srvc: "demo".into(),
        procedure: "echo".into(),
        data: vec![0u8; 64],
        deadline: Some(1_700_000_000_000_000),
        caller_id: Some("bench-caller".into()),
        want_trace: Some(true),
    }
}

fn sample_response() -> RPCResponse {
    RPCResponse {
        rpc_id: "bench-rpc-id".into(),
        response_status: Status::Ok,
        response_data: vec![0u8; 64],
        error_message: String::new(),
        traceinfo: Some(TraceInfo {
            received_time: 10,
            replied_time: 20,
            machine_name: "bench-host".into(),
            endpoint_name: "demo.echo".into(),
            error_message: String::new(),
            redirect: String::new(),
            child_calls: vec![],
        }),
    }
}

pub fn request_codec(c: &mut Criterion) {
    let req = sample_request();
    let mut buf = Vec::new();
    req.serialise_into(&mut buf).unwrap();

    c.bench_function("decode_rpc_request", |b| {
        b.iter(|| {
            let decoded = RPCRequest::from_bytes(black_box(&buf)).unwrap();
            black_box(decoded)
        })
    });

    c.bench_function("serialise_into_rpc_request", |b| {
        let mut cursor = Cursor::new(Vec::new());
        b.iter(|| {
            cursor.set_position(0);
            req.serialise_into(&mut cursor).expect("failed to serialise");
            black_box(&cursor);
        })
    });
}

pub fn response_codec(c: &mut Criterion) {
    let resp = sample_response();
    let mut buf = Vec::new();
    resp.serialise_into(&mut buf).unwrap();

    c.bench_function("decode_rpc_response", |b| {
        b.iter(|| {
            let decoded = RPCResponse::from_bytes(black_box(&buf)).unwrap();
            black_box(decoded)
        })
    });

    c.bench_function("encode_small_rpc_response", |b| {
        b.iter(|| black_box(resp.encode()))
    });
}

criterion_group!(benches, request_codec, response_codec);
criterion_main!(benches);
