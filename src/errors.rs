use thiserror::Error;

/// Error types returned by this crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    /// The buffer handed to a decoder was shorter than the field it was
    /// about to read, or a length prefix in the buffer points past the end
    /// of the buffer.
    #[error("truncated rpc message (got {buffer_len} bytes, needed at least {expected})")]
    Truncated {
        /// The length of the buffer provided.
        buffer_len: usize,

        /// The minimum length required to continue decoding.
        expected: usize,
    },

    /// A length-prefixed field declared a length that exceeds this crate's
    /// sanity limit, most likely indicating a corrupt or malicious payload.
    #[error("field length {0} exceeds the maximum allowed")]
    FieldTooLarge(u32),

    /// A string field was not valid UTF-8.
    #[error("invalid utf-8 in rpc message field")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The response status code on the wire is not one of the values
    /// defined by [`Status`](crate::Status).
    #[error("invalid response status {0}")]
    InvalidStatus(u32),

    /// The frontend or backend envelope did not contain the expected number
    /// of frames.
    #[error("bad envelope: expected {expected} frames, got {got}")]
    BadFrameCount {
        /// The number of frames the protocol requires at this hop.
        expected: usize,
        /// The number of frames actually present.
        got: usize,
    },

    /// More workers were requested at startup than can be represented by the
    /// 4-digit zero-padded worker identity.
    #[error("cannot start {0} workers, the identity scheme supports at most 9999")]
    TooManyWorkers(usize),

    /// A ZeroMQ socket operation failed.
    #[error("zmq transport error: {0}")]
    Zmq(#[from] zmq::Error),

    /// An I/O error occurred outside of ZeroMQ (e.g. resolving the local
    /// hostname).
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
