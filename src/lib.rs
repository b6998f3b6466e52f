#![doc = include_str!("../README.md")]
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(
    clippy::clone_on_ref_ptr,
    clippy::dbg_macro,
    clippy::explicit_iter_loop,
    clippy::future_not_send,
    clippy::todo,
    clippy::unimplemented,
    clippy::use_self,
    clippy::doc_markdown,
    clippy::print_stdout,
    missing_debug_implementations,
    unused_crate_dependencies,
    unreachable_pub,
    missing_docs
)]

mod errors;
pub use errors::Error;

mod status;
pub use status::Status;

mod wire;

mod rpc_message;
pub use rpc_message::{RPCRequest, RPCResponse, ResponseBuffer, TraceInfo, SMALL_RESPONSE_THRESHOLD};

mod envelope;
mod ring;
mod trace;

mod dispatch;
pub use dispatch::{Dispatch, HandlerContext, HandlerFn, HandlerOutcome};

mod worker;
mod broker;

mod server;
pub use server::{Server, ServerConfig};

#[cfg(test)]
use criterion as _;
#[cfg(test)]
use proptest as _;
