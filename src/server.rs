//! Top-level startup/shutdown: binds both ROUTER sockets, spawns the worker
//! pool, and drives the broker loop on its own thread.

use std::sync::Arc;
use std::thread::JoinHandle;

use tracing::info;

use crate::broker::Broker;
use crate::dispatch::Dispatch;
use crate::worker;
use crate::Error;

/// The three caller-supplied knobs: worker count and pending-queue capacity
/// are fixed at startup; the frontend address is passed separately to
/// [`Server::start`].
#[derive(Debug, Clone, Copy)]
pub struct ServerConfig {
    /// Number of long-lived worker threads to spawn. Must not exceed 9999
    /// (the 4-digit identity scheme's limit).
    pub n_workers: usize,
    /// Capacity of the broker's pending-request ring buffer. Requests that
    /// arrive with no free worker and a full pending queue are answered
    /// with `STATUS_OVERLOADED_RETRY` directly.
    pub queue_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            n_workers: 4,
            queue_capacity: 64,
        }
    }
}

/// A running broker and its worker pool.
///
/// Worker threads are intentionally never joined on [`Server::shutdown`]:
/// this crate does not implement worker cancellation (see the crate-level
/// docs), so in-flight workers are left running until the process exits.
pub struct Server {
    shutdown_socket: zmq::Socket,
    broker_thread: Option<JoinHandle<Result<(), Error>>>,
    worker_threads: Vec<JoinHandle<Result<(), Error>>>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("worker_count", &self.worker_threads.len())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Binds the frontend ROUTER socket to `address`, builds a unique
    /// internal backend endpoint, spawns `config.n_workers` worker threads,
    /// and starts the broker loop on a dedicated thread.
    pub fn start(
        address: &str,
        dispatch: Arc<dyn Dispatch>,
        config: ServerConfig,
    ) -> Result<Self, Error> {
        if config.n_workers > 9999 {
            return Err(Error::TooManyWorkers(config.n_workers));
        }

        let ctx = zmq::Context::new();
        let backend_endpoint = format!("inproc://backend.router.{}", std::process::id());

        let frontend = ctx.socket(zmq::ROUTER)?;
        frontend.set_router_mandatory(true)?;
        frontend.bind(address)?;

        let backend = ctx.socket(zmq::ROUTER)?;
        backend.set_router_mandatory(true)?;
        backend.bind(&backend_endpoint)?;

        let mut broker = Broker::new(
            ctx.clone(),
            frontend,
            backend,
            dispatch.clone(),
            config.n_workers,
            config.queue_capacity,
        )?;
        let shutdown_socket = broker.shutdown_handle()?;

        let worker_threads = (0..config.n_workers)
            .map(|i| {
                let ctx = ctx.clone();
                let backend_endpoint = backend_endpoint.clone();
                let dispatch = dispatch.clone();
                std::thread::Builder::new()
                    .name(format!("clusterrpc-worker-{i}"))
                    .spawn(move || worker::run(&ctx, &backend_endpoint, i, dispatch))
                    .map_err(Error::Io)
            })
            .collect::<Result<Vec<_>, Error>>()?;

        let broker_thread = std::thread::Builder::new()
            .name("clusterrpc-broker".to_string())
            .spawn(move || broker.run())
            .map_err(Error::Io)?;

        info!(address, n_workers = config.n_workers, "clusterrpc broker started");

        Ok(Server {
            shutdown_socket,
            broker_thread: Some(broker_thread),
            worker_threads,
        })
    }

    /// Requests a graceful stop and waits for the broker thread to return.
    /// Worker threads are not joined; see the struct docs.
    pub fn shutdown(mut self) -> Result<(), Error> {
        self.shutdown_socket.send("", 0)?;
        if let Some(handle) = self.broker_thread.take() {
            match handle.join() {
                Ok(result) => result?,
                Err(_) => {
                    return Err(Error::Io(std::io::Error::other(
                        "broker thread panicked",
                    )))
                }
            }
        }
        Ok(())
    }
}
