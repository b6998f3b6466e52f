//! Demo binary: starts a broker that serves a single `demo.echo` endpoint
//! until interrupted with Ctrl+C, then requests a graceful shutdown.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use clap::Parser;
use clusterrpc_broker::{Dispatch, HandlerContext, HandlerFn, HandlerOutcome, Server, ServerConfig};
use tracing::info;

/// Runs a clustered RPC broker with a demo `demo.echo` handler registered.
#[derive(Debug, Parser)]
#[command(name = "broker-server", version, about)]
struct Args {
    /// Frontend address to bind, e.g. `tcp://0.0.0.0:5555` or `ipc:///tmp/clusterrpc.sock`.
    #[arg(long, default_value = "tcp://0.0.0.0:5555")]
    address: String,

    /// Number of worker threads to spawn.
    #[arg(long, default_value_t = 4)]
    workers: usize,

    /// Capacity of the pending-request queue.
    #[arg(long, default_value_t = 64)]
    queue_capacity: usize,
}

/// A `Dispatch` backed by a static map from `(service, procedure)` to handler.
struct StaticDispatch(RwLock<HashMap<(String, String), HandlerFn>>);

impl Dispatch for StaticDispatch {
    fn find(&self, service: &str, procedure: &str) -> Option<HandlerFn> {
        self.0
            .read()
            .expect("dispatch table lock poisoned")
            .get(&(service.to_string(), procedure.to_string()))
            .cloned()
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut table: HashMap<(String, String), HandlerFn> = HashMap::new();
    table.insert(
        ("demo".to_string(), "echo".to_string()),
        Arc::new(|ctx: HandlerContext<'_>| HandlerOutcome::ok(ctx.input.to_vec())),
    );
    let dispatch = Arc::new(StaticDispatch(RwLock::new(table)));

    let config = ServerConfig {
        n_workers: args.workers,
        queue_capacity: args.queue_capacity,
    };

    let server = Server::start(&args.address, dispatch, config)?;
    info!(address = %args.address, "serving demo.echo, press Ctrl+C to stop");

    let (tx, rx) = std::sync::mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })?;
    rx.recv().ok();

    info!("shutting down");
    server.shutdown()?;
    Ok(())
}
