//! The broker event loop: a single thread owning both ROUTER sockets and all
//! scheduling state. See the module-level docs on [`Broker::run`] for the
//! dispatch algorithm.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::dispatch::Dispatch;
use crate::envelope::{decode_backend_frames, ClientEnvelope};
use crate::ring::Ring;
use crate::rpc_message::{RPCRequest, RPCResponse};
use crate::status::Status;
use crate::worker::worker_identity;
use crate::Error;

static CONTROL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Returns a process-unique `inproc://` endpoint for a broker's shutdown
/// control socket.
pub fn unique_control_endpoint() -> String {
    let seq = CONTROL_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("inproc://control.{}.{}", std::process::id(), seq)
}

/// Owns the frontend/backend ROUTER sockets and the scheduler state
/// (`workers`, `free_workers`, `pending`) described in the crate's data
/// model. Mutated exclusively by [`Broker::run`]'s calling thread; no
/// internal locking.
///
/// Deadlines carried on `RPCRequest` are parsed but never enforced by this
/// broker: no request is ever rejected or pre-empted for having passed its
/// deadline. Enforcing deadlines is left to the embedder (e.g. by checking
/// `RPCRequest::deadline` inside the handler) or a future version of this
/// crate.
pub struct Broker {
    ctx: zmq::Context,
    frontend: zmq::Socket,
    backend: zmq::Socket,
    control: zmq::Socket,
    control_endpoint: String,
    dispatch: Arc<dyn Dispatch>,
    workers: Vec<Vec<u8>>,
    free_workers: Ring<usize>,
    pending: Ring<ClientEnvelope>,
}

impl Broker {
    /// Builds a broker over already-bound `frontend`/`backend` ROUTER
    /// sockets. Binds its own control `PULL` socket at a freshly generated
    /// `inproc://` endpoint.
    pub fn new(
        ctx: zmq::Context,
        frontend: zmq::Socket,
        backend: zmq::Socket,
        dispatch: Arc<dyn Dispatch>,
        n_workers: usize,
        queue_capacity: usize,
    ) -> Result<Self, Error> {
        let control_endpoint = unique_control_endpoint();
        let control = ctx.socket(zmq::PULL)?;
        control.bind(&control_endpoint)?;

        Ok(Broker {
            ctx,
            frontend,
            backend,
            control,
            control_endpoint,
            dispatch,
            workers: Vec::with_capacity(n_workers),
            free_workers: Ring::new(n_workers),
            pending: Ring::new(queue_capacity),
        })
    }

    /// Returns a `PUSH` socket connected to this broker's control endpoint.
    /// Sending any single-frame message on it requests a graceful stop of
    /// [`Broker::run`].
    pub fn shutdown_handle(&self) -> Result<zmq::Socket, Error> {
        let push = self.ctx.socket(zmq::PUSH)?;
        push.connect(&self.control_endpoint)?;
        Ok(push)
    }

    /// Runs the broker loop until a shutdown request arrives on the control
    /// socket, or a socket operation fails.
    ///
    /// On frontend-ready: decode the 4-frame envelope; dispatch to a free
    /// worker if one exists, else enqueue if the pending queue has room,
    /// else reply `STATUS_OVERLOADED_RETRY` directly (no envelope is ever
    /// forwarded to a worker that doesn't exist). On backend-ready: resolve
    /// the sending worker's index; a READY payload marks it free without
    /// forwarding anything; any other payload is forwarded to the frontend,
    /// after which a pending envelope is immediately redispatched to the
    /// same worker, or the worker returns to the free pool. Dispatch is FIFO
    /// throughout with no priority.
    pub fn run(&mut self) -> Result<(), Error> {
        loop {
            let mut items = [
                self.frontend.as_poll_item(zmq::POLLIN),
                self.backend.as_poll_item(zmq::POLLIN),
                self.control.as_poll_item(zmq::POLLIN),
            ];
            zmq::poll(&mut items, -1)?;

            if items[2].is_readable() {
                // Drain the control message itself before acting on it.
                self.control.recv_multipart(0)?;
                info!("shutdown requested, draining dispatchable pending work");
                self.drain_pending()?;
                return Ok(());
            }

            if items[1].is_readable() {
                self.handle_backend()?;
            }

            if items[0].is_readable() {
                self.handle_frontend()?;
            }
        }
    }

    fn handle_frontend(&mut self) -> Result<(), Error> {
        let frames = self.frontend.recv_multipart(0)?;
        let envelope = match ClientEnvelope::from_frontend_frames(frames) {
            Ok(e) => e,
            Err(e) => {
                error!(error = %e, "malformed client envelope, dropping");
                return Ok(());
            }
        };

        self.dispatch_or_queue(envelope)
    }

    fn dispatch_or_queue(&mut self, envelope: ClientEnvelope) -> Result<(), Error> {
        if let Some(worker_idx) = self.free_workers.dequeue() {
            self.send_to_worker(worker_idx, envelope)
        } else if !self.pending.is_full() {
            self.pending.enqueue(envelope);
            Ok(())
        } else {
            self.reply_overloaded(envelope)
        }
    }

    fn handle_backend(&mut self) -> Result<(), Error> {
        let frames = self.backend.recv_multipart(0)?;
        let (worker_identity, envelope) = match decode_backend_frames(frames) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "malformed backend envelope, dropping");
                return Ok(());
            }
        };

        let worker_idx = self.worker_index(&worker_identity);

        if envelope.is_ready_marker() {
            self.free_workers.enqueue(worker_idx);
            return Ok(());
        }

        self.frontend.send_multipart(envelope.into_frontend_frames(), 0)?;

        if let Some(next) = self.pending.dequeue() {
            self.send_to_worker(worker_idx, next)
        } else {
            self.free_workers.enqueue(worker_idx);
            Ok(())
        }
    }

    fn send_to_worker(&mut self, worker_idx: usize, envelope: ClientEnvelope) -> Result<(), Error> {
        let identity = self.workers[worker_idx].clone();
        self.backend
            .send_multipart(envelope.into_backend_frames(&identity), 0)?;
        Ok(())
    }

    fn worker_index(&mut self, identity: &[u8]) -> usize {
        if let Some(idx) = self.workers.iter().position(|w| w.as_slice() == identity) {
            return idx;
        }
        self.workers.push(identity.to_vec());
        self.workers.len() - 1
    }

    fn reply_overloaded(&mut self, envelope: ClientEnvelope) -> Result<(), Error> {
        let rpc_id = RPCRequest::from_bytes(&envelope.payload)
            .map(|r| r.rpc_id)
            .unwrap_or_default();
        warn!(rpc_id = %rpc_id, "no free worker and pending queue full, shedding load");

        let response = RPCResponse {
            rpc_id,
            response_status: Status::OverloadedRetry,
            response_data: Vec::new(),
            error_message: "server overloaded, retry later".to_string(),
            traceinfo: None,
        };

        let reply = ClientEnvelope {
            client_id: envelope.client_id,
            request_id: envelope.request_id,
            payload: response.encode().as_ref().to_vec(),
        };
        self.frontend.send_multipart(reply.into_frontend_frames(), 0)?;
        Ok(())
    }

    /// Dispatches any pending envelopes that currently have a free worker
    /// available, without blocking on further socket activity. Used on
    /// shutdown; any pending envelope left without a free worker is dropped,
    /// along with any in-flight worker replies, since workers are not
    /// cancelled.
    fn drain_pending(&mut self) -> Result<(), Error> {
        let mut dropped = 0usize;
        while let Some(worker_idx) = self.free_workers.dequeue() {
            match self.pending.dequeue() {
                Some(envelope) => self.send_to_worker(worker_idx, envelope)?,
                None => {
                    self.free_workers.enqueue(worker_idx);
                    break;
                }
            }
        }
        while self.pending.dequeue().is_some() {
            dropped += 1;
        }
        if dropped > 0 {
            warn!(dropped, "shutdown: dropping pending envelopes with no free worker");
        }
        Ok(())
    }

    /// The number of workers this broker has heard from so far (via READY or
    /// a response), used only by tests and diagnostics.
    #[cfg(test)]
    fn known_workers(&self) -> usize {
        self.workers.len()
    }
}
