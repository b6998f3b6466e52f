//! The embedder-supplied lookup from `(service, procedure)` to a handler.

use std::sync::Arc;

/// Input handed to a handler: the decoded request's opaque payload.
#[derive(Debug, Clone, Copy)]
pub struct HandlerContext<'a> {
    /// The `RPCRequest::data` field of the request being dispatched.
    pub input: &'a [u8],
}

/// The result of running a handler.
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    /// `true` if the handler considers the call to have succeeded.
    pub ok: bool,
    /// Populated on failure; carried into `RPCResponse::error_message`.
    pub error: Option<String>,
    /// The handler's response payload, if any.
    pub response: Option<Vec<u8>>,
}

impl HandlerOutcome {
    /// Builds a successful outcome carrying `response`.
    pub fn ok(response: Vec<u8>) -> Self {
        HandlerOutcome {
            ok: true,
            error: None,
            response: Some(response),
        }
    }

    /// Builds a failed outcome carrying `message`.
    pub fn failed(message: impl Into<String>) -> Self {
        HandlerOutcome {
            ok: false,
            error: Some(message.into()),
            response: None,
        }
    }
}

/// A single RPC handler. Must be `Send + Sync` so the same handler can be
/// shared across worker threads, and [`std::panic::UnwindSafe`] is enforced
/// at the call site in [`crate::worker`] rather than in this type alias.
pub type HandlerFn = Arc<dyn Fn(HandlerContext<'_>) -> HandlerOutcome + Send + Sync>;

/// Looks up a handler for a `(service, procedure)` pair. Implemented by the
/// embedder; this crate only calls [`Dispatch::find`].
pub trait Dispatch: Send + Sync {
    /// Returns the handler registered for `(service, procedure)`, or `None`
    /// if no such endpoint is registered.
    fn find(&self, service: &str, procedure: &str) -> Option<HandlerFn>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapDispatch(HashMap<(&'static str, &'static str), HandlerFn>);

    impl Dispatch for MapDispatch {
        fn find(&self, service: &str, procedure: &str) -> Option<HandlerFn> {
            self.0
                .iter()
                .find(|((s, p), _)| *s == service && *p == procedure)
                .map(|(_, f)| f.clone())
        }
    }

    #[test]
    fn finds_registered_handler_and_misses_unregistered_one() {
        let mut m: HashMap<(&'static str, &'static str), HandlerFn> = HashMap::new();
        m.insert(
            ("echo", "any"),
            Arc::new(|ctx: HandlerContext<'_>| HandlerOutcome::ok(ctx.input.to_vec())),
        );
        let dispatch = MapDispatch(m);

        let handler = dispatch.find("echo", "any").expect("handler missing");
        let out = handler(HandlerContext { input: b"hi" });
        assert!(out.ok);
        assert_eq!(out.response.as_deref(), Some(b"hi".as_slice()));

        assert!(dispatch.find("echo", "missing").is_none());
    }
}
