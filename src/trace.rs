//! Helpers for populating [`TraceInfo`](crate::TraceInfo) on opted-in
//! requests.

use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::rpc_message::TraceInfo;

static MACHINE_NAME: OnceLock<String> = OnceLock::new();

/// Returns the process-wide cached host name, resolving it once via
/// [`hostname::get`] on first call.
pub fn machine_name() -> &'static str {
    MACHINE_NAME
        .get_or_init(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string())
        })
        .as_str()
}

/// Current UNIX time in microseconds. Used for `received_time`/`replied_time`.
pub fn now_micros() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

/// Builds a fresh trace, recording `received_time` as the current time.
/// `replied_time` is filled in later via [`Recorder::finish`].
pub struct Recorder {
    received_time: i64,
    endpoint_name: String,
}

impl Recorder {
    /// Starts a trace for an invocation of `"<srvc>.<procedure>"`.
    pub fn start(srvc: &str, procedure: &str) -> Self {
        Recorder {
            received_time: now_micros(),
            endpoint_name: format!("{srvc}.{procedure}"),
        }
    }

    /// Finalises the trace, stamping `replied_time` as the current time.
    pub fn finish(self, error_message: String) -> TraceInfo {
        TraceInfo {
            received_time: self.received_time,
            replied_time: now_micros(),
            machine_name: machine_name().to_string(),
            endpoint_name: self.endpoint_name,
            error_message,
            redirect: String::new(),
            child_calls: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn machine_name_is_stable_across_calls() {
        assert_eq!(machine_name(), machine_name());
        assert!(!machine_name().is_empty());
    }

    #[test]
    fn recorder_produces_monotonic_timestamps() {
        let rec = Recorder::start("echo", "any");
        let trace = rec.finish(String::new());
        assert!(trace.replied_time >= trace.received_time);
        assert_eq!(trace.endpoint_name, "echo.any");
        assert!(trace.child_calls.is_empty());
    }
}
