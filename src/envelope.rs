//! Multi-part frame envelopes exchanged with the ZeroMQ ROUTER sockets.
//!
//! The frontend-facing envelope is always exactly four frames; the
//! backend-facing one always exactly six. See [`ClientEnvelope`] and
//! [`decode_backend_frames`].

use crate::Error;

/// Marker payload a worker sends on its backend socket immediately after
/// connecting, before it has ever been handed a real request.
pub const READY_MARKER: &[u8] = b"__ready__";

/// A decoded client-facing envelope: `[client_id, request_id, "", payload]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientEnvelope {
    /// The ROUTER-supplied identity of the connected client.
    pub client_id: Vec<u8>,
    /// Client-chosen correlation frame, echoed back verbatim.
    pub request_id: Vec<u8>,
    /// The serialised `RPCRequest` or `RPCResponse`.
    pub payload: Vec<u8>,
}

impl ClientEnvelope {
    /// Decodes a 4-frame message received on the frontend ROUTER socket.
    pub fn from_frontend_frames(frames: Vec<Vec<u8>>) -> Result<Self, Error> {
        if frames.len() != 4 {
            return Err(Error::BadFrameCount {
                expected: 4,
                got: frames.len(),
            });
        }
        let mut it = frames.into_iter();
        let client_id = it.next().unwrap();
        let request_id = it.next().unwrap();
        let _empty = it.next().unwrap();
        let payload = it.next().unwrap();

        Ok(ClientEnvelope {
            client_id,
            request_id,
            payload,
        })
    }

    /// Encodes this envelope back into the 4 frames the frontend ROUTER
    /// socket expects, for a reply sent directly by the broker (e.g. an
    /// overload-shed response that never reaches a worker).
    pub fn into_frontend_frames(self) -> Vec<Vec<u8>> {
        vec![self.client_id, self.request_id, Vec::new(), self.payload]
    }

    /// Encodes this envelope as the 6-frame message dispatched to
    /// `worker_identity` on the backend ROUTER socket:
    /// `[worker_identity, "", client_id, request_id, "", payload]`.
    pub fn into_backend_frames(self, worker_identity: &[u8]) -> Vec<Vec<u8>> {
        vec![
            worker_identity.to_vec(),
            Vec::new(),
            self.client_id,
            self.request_id,
            Vec::new(),
            self.payload,
        ]
    }

    /// Returns `true` if this envelope's payload is the worker READY marker.
    pub fn is_ready_marker(&self) -> bool {
        self.payload == READY_MARKER
    }
}

/// Decodes a 6-frame message received on the backend ROUTER socket into the
/// sending worker's identity and the client envelope it carries.
pub fn decode_backend_frames(frames: Vec<Vec<u8>>) -> Result<(Vec<u8>, ClientEnvelope), Error> {
    if frames.len() != 6 {
        return Err(Error::BadFrameCount {
            expected: 6,
            got: frames.len(),
        });
    }
    let mut it = frames.into_iter();
    let worker_identity = it.next().unwrap();
    let _empty = it.next().unwrap();
    let client_id = it.next().unwrap();
    let request_id = it.next().unwrap();
    let _empty = it.next().unwrap();
    let payload = it.next().unwrap();

    Ok((
        worker_identity,
        ClientEnvelope {
            client_id,
            request_id,
            payload,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_well_formed_frontend_frames() {
        let frames = vec![b"client-1".to_vec(), b"req-1".to_vec(), vec![], b"payload".to_vec()];
        let env = ClientEnvelope::from_frontend_frames(frames).unwrap();
        assert_eq!(env.client_id, b"client-1");
        assert_eq!(env.request_id, b"req-1");
        assert_eq!(env.payload, b"payload");
    }

    #[test]
    fn rejects_wrong_frontend_frame_count() {
        let frames = vec![b"client-1".to_vec(), b"req-1".to_vec()];
        let err = ClientEnvelope::from_frontend_frames(frames).unwrap_err();
        assert!(matches!(
            err,
            Error::BadFrameCount { expected: 4, got: 2 }
        ));
    }

    #[test]
    fn round_trips_through_backend_frames() {
        let env = ClientEnvelope {
            client_id: b"client-1".to_vec(),
            request_id: b"req-1".to_vec(),
            payload: b"payload".to_vec(),
        };
        let backend_frames = env.clone().into_backend_frames(b"0003");
        assert_eq!(backend_frames.len(), 6);
        assert_eq!(backend_frames[0], b"0003");

        let (worker_id, decoded) = decode_backend_frames(backend_frames).unwrap();
        assert_eq!(worker_id, b"0003");
        assert_eq!(decoded, env);
    }

    #[test]
    fn rejects_wrong_backend_frame_count() {
        let err = decode_backend_frames(vec![b"0003".to_vec()]).unwrap_err();
        assert!(matches!(
            err,
            Error::BadFrameCount { expected: 6, got: 1 }
        ));
    }

    #[test]
    fn recognises_ready_marker() {
        let env = ClientEnvelope {
            client_id: b"BOGUS_CLIENT_ID".to_vec(),
            request_id: b"REQUEST_ID".to_vec(),
            payload: READY_MARKER.to_vec(),
        };
        assert!(env.is_ready_marker());
    }
}
