//! Worker thread: the `STARTING -> READY -> BUSY -> READY -> ... -> EXIT`
//! state machine that dispatches decoded requests to embedder-supplied
//! handlers.
//!
//! A worker's REQ socket automatically prepends/strips the empty delimiter
//! frame ROUTER peers expect, so the 4 frames a worker sends/receives here
//! are exactly the frontend-facing [`ClientEnvelope`] frames; the broker's
//! backend ROUTER socket is the one that sees the full 6-frame form.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tracing::{error, warn};

use crate::dispatch::{Dispatch, HandlerContext};
use crate::envelope::READY_MARKER;
use crate::rpc_message::{RPCRequest, RPCResponse};
use crate::status::Status;
use crate::trace::Recorder;
use crate::Error;

/// Formats a worker's 4-digit zero-padded REQ socket identity.
///
/// Returns [`Error::TooManyWorkers`] if `index` cannot be represented in 4
/// digits.
pub fn worker_identity(index: usize) -> Result<String, Error> {
    if index > 9999 {
        return Err(Error::TooManyWorkers(index));
    }
    Ok(format!("{index:04}"))
}

/// Runs one worker's `STARTING -> READY -> BUSY -> ...` loop until the REQ
/// socket errors out (which happens when the broker tears down the backend
/// socket on shutdown).
pub fn run(
    ctx: &zmq::Context,
    backend_endpoint: &str,
    index: usize,
    dispatch: Arc<dyn Dispatch>,
) -> Result<(), Error> {
    let identity = worker_identity(index)?;
    let socket = ctx.socket(zmq::REQ)?;
    socket.set_identity(identity.as_bytes())?;
    socket.connect(backend_endpoint)?;

    // STARTING -> READY: announce availability with the 4-frame READY
    // envelope. client_id/request_id are placeholders never referenced by
    // the broker for a READY message.
    socket.send_multipart(
        [b"BOGUS_CLIENT_ID".as_slice(), b"REQUEST_ID", b"", READY_MARKER],
        0,
    )?;

    loop {
        let frames = match socket.recv_multipart(0) {
            Ok(f) => f,
            Err(e) => {
                warn!(worker = %identity, error = %e, "backend socket closed, worker exiting");
                return Ok(());
            }
        };

        if frames.len() != 4 {
            // The broker guarantees 4 frames; if that invariant is ever
            // violated there is no well-formed client to answer, so log and
            // keep looping rather than crash the worker.
            error!(worker = %identity, got = frames.len(), "malformed request envelope, dropping");
            continue;
        }
        let client_id = frames[0].clone();
        let request_id = frames[1].clone();
        let payload = frames[3].clone();

        let response_payload = handle_one(&dispatch, &payload);

        socket.send_multipart(
            [client_id.as_slice(), request_id.as_slice(), b"", response_payload.as_ref()],
            0,
        )?;
    }
}

fn handle_one(dispatch: &Arc<dyn Dispatch>, payload: &[u8]) -> crate::ResponseBuffer {
    let request = match RPCRequest::from_bytes(payload) {
        Ok(r) => r,
        Err(e) => {
            // No rpc_id could be recovered from a payload that doesn't even
            // parse; answer with an empty one rather than dropping silently.
            error!(error = %e, "failed to decode request payload");
            return RPCResponse {
                rpc_id: String::new(),
                response_status: Status::ServerError,
                response_data: Vec::new(),
                error_message: format!("failed to decode request: {e}"),
                traceinfo: None,
            }
            .encode();
        }
    };

    let recorder = request.wants_trace().then(|| Recorder::start(&request.srvc, &request.procedure));

    let handler = dispatch.find(&request.srvc, &request.procedure);
    let (status, error_message, data) = match handler {
        None => (
            Status::NotFound,
            "no handler could be found".to_string(),
            Vec::new(),
        ),
        Some(handler) => {
            let ctx = HandlerContext { input: &request.data };
            match std::panic::catch_unwind(AssertUnwindSafe(|| handler(ctx))) {
                Ok(outcome) if outcome.ok => {
                    (Status::Ok, String::new(), outcome.response.unwrap_or_default())
                }
                Ok(outcome) => (
                    Status::NotOk,
                    outcome.error.unwrap_or_default(),
                    Vec::new(),
                ),
                Err(panic) => {
                    let message = panic_message(&panic);
                    error!(
                        service = %request.srvc,
                        procedure = %request.procedure,
                        panic = %message,
                        "handler panicked"
                    );
                    #[cfg(debug_assertions)]
                    std::panic::resume_unwind(panic);
                    #[cfg(not(debug_assertions))]
                    (Status::ServerError, message, Vec::new())
                }
            }
        }
    };

    let traceinfo = recorder.map(|r| r.finish(error_message.clone()));

    RPCResponse {
        rpc_id: request.rpc_id,
        response_status: status,
        response_data: data,
        error_message,
        traceinfo,
    }
    .encode()
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
