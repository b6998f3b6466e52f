//! Decoded request/response types for the clustered RPC protocol, and their
//! wire encoding.
//!
//! Fields are encoded in declaration order using the length-prefixed
//! primitives in [`crate::wire`]; see that module for the framing rules.

use std::io::{Cursor, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::status::Status;
use crate::wire::{
    bytes_len, option_len, read_bytes, read_option, read_string, string_len, write_bytes,
    write_option, write_string,
};
use crate::Error;

/// The largest response that is serialised into a stack buffer rather than
/// a heap allocation. Mirrors the 128-byte inline threshold named in the
/// protocol's small-response optimisation.
pub const SMALL_RESPONSE_THRESHOLD: usize = 128;

/// A decoded RPC invocation request.
#[derive(Debug, Clone, PartialEq)]
pub struct RPCRequest {
    /// A unique-ish identifier for this RPC, echoed back on the response.
    pub rpc_id: String,
    /// The name of the service the client wants to call.
    pub srvc: String,
    /// The name of the procedure on `srvc` to invoke.
    pub procedure: String,
    /// The opaque request payload handed to the handler.
    pub data: Vec<u8>,
    /// UNIX microsecond timestamp after which the caller no longer wants a
    /// reply. Not enforced by this crate; see [`crate::broker`] docs.
    pub deadline: Option<i64>,
    /// Identifies the caller, if the client chose to supply one.
    pub caller_id: Option<String>,
    /// If set to `Some(true)`, the response carries a [`TraceInfo`].
    pub want_trace: Option<bool>,
}

impl RPCRequest {
    /// Decodes an `RPCRequest` from its wire representation.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Cursor::new(buf);
        let rpc_id = read_string(&mut r)?;
        let srvc = read_string(&mut r)?;
        let procedure = read_string(&mut r)?;
        let data = read_bytes(&mut r)?.to_vec();
        let deadline = read_option(&mut r, |c| Ok(c.read_i64::<BigEndian>()?))?;
        let caller_id = read_option(&mut r, read_string)?;
        let want_trace = read_option(&mut r, |c| Ok(c.read_u8()? != 0))?;

        Ok(RPCRequest {
            rpc_id,
            srvc,
            procedure,
            data,
            deadline,
            caller_id,
            want_trace,
        })
    }

    /// Serialises this request into `buf`.
    pub fn serialise_into<W: Write>(&self, buf: &mut W) -> std::io::Result<()> {
        write_string(buf, &self.rpc_id)?;
        write_string(buf, &self.srvc)?;
        write_string(buf, &self.procedure)?;
        write_bytes(buf, &self.data)?;
        write_option(buf, &self.deadline, |b, v| b.write_i64::<BigEndian>(*v))?;
        write_option(buf, &self.caller_id, |b, v| write_string(b, v))?;
        write_option(buf, &self.want_trace, |b, v| {
            b.write_u8(if *v { 1 } else { 0 })
        })?;
        Ok(())
    }

    /// Returns the on-wire length of this request once serialised.
    pub fn serialised_len(&self) -> u32 {
        string_len(&self.rpc_id)
            + string_len(&self.srvc)
            + string_len(&self.procedure)
            + bytes_len(&self.data)
            + option_len(self.deadline.is_some(), 8)
            + option_len(
                self.caller_id.is_some(),
                self.caller_id.as_deref().map(string_len).unwrap_or(0),
            )
            + option_len(self.want_trace.is_some(), 1)
    }

    /// Returns `true` if the client opted into trace timing.
    pub fn wants_trace(&self) -> bool {
        self.want_trace == Some(true)
    }
}

/// Timing and routing metadata attached to a response when the request
/// opted in via `want_trace`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraceInfo {
    /// UNIX microsecond timestamp taken right after the request envelope
    /// was decoded, before handler dispatch.
    pub received_time: i64,
    /// UNIX microsecond timestamp taken right before the response was
    /// encoded.
    pub replied_time: i64,
    /// The host name of the machine that served this request.
    pub machine_name: String,
    /// `"<srvc>.<procedure>"` for the endpoint that was invoked.
    pub endpoint_name: String,
    /// Populated only if the broker itself failed (decode errors etc.);
    /// empty otherwise.
    pub error_message: String,
    /// Unused by this core; present for client-side redirect composition.
    pub redirect: String,
    /// Always empty: this core does not perform nested/child RPC calls.
    /// The field is defined so client-side trace composition has somewhere
    /// to attach them.
    pub child_calls: Vec<TraceInfo>,
}

impl TraceInfo {
    fn from_cursor(r: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        let received_time = r.read_i64::<BigEndian>()?;
        let replied_time = r.read_i64::<BigEndian>()?;
        let machine_name = read_string(r)?;
        let endpoint_name = read_string(r)?;
        let error_message = read_string(r)?;
        let redirect = read_string(r)?;
        let n_children = r.read_u32::<BigEndian>()?;
        let mut child_calls = Vec::with_capacity(n_children as usize);
        for _ in 0..n_children {
            child_calls.push(TraceInfo::from_cursor(r)?);
        }

        Ok(TraceInfo {
            received_time,
            replied_time,
            machine_name,
            endpoint_name,
            error_message,
            redirect,
            child_calls,
        })
    }

    fn serialise_into<W: Write>(&self, buf: &mut W) -> std::io::Result<()> {
        buf.write_i64::<BigEndian>(self.received_time)?;
        buf.write_i64::<BigEndian>(self.replied_time)?;
        write_string(buf, &self.machine_name)?;
        write_string(buf, &self.endpoint_name)?;
        write_string(buf, &self.error_message)?;
        write_string(buf, &self.redirect)?;
        buf.write_u32::<BigEndian>(self.child_calls.len() as u32)?;
        for c in &self.child_calls {
            c.serialise_into(buf)?;
        }
        Ok(())
    }

    fn serialised_len(&self) -> u32 {
        8 + 8
            + string_len(&self.machine_name)
            + string_len(&self.endpoint_name)
            + string_len(&self.error_message)
            + string_len(&self.redirect)
            + 4
            + self
                .child_calls
                .iter()
                .map(TraceInfo::serialised_len)
                .sum::<u32>()
    }
}

/// A response to an [`RPCRequest`].
#[derive(Debug, Clone, PartialEq)]
pub struct RPCResponse {
    /// Echoes the request's `rpc_id`.
    pub rpc_id: String,
    /// The outcome of the invocation.
    pub response_status: Status,
    /// The handler's response payload. Always present on the wire (the
    /// protocol's `has_response_data` flag is unconditionally set by the
    /// server side), even when zero-length.
    pub response_data: Vec<u8>,
    /// Empty on success; populated on [`Status::NotOk`], [`Status::NotFound`]
    /// and other failure statuses.
    pub error_message: String,
    /// Present only if the request had `want_trace = Some(true)`.
    pub traceinfo: Option<TraceInfo>,
}

impl RPCResponse {
    /// Decodes an `RPCResponse` from its wire representation.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, Error> {
        let mut r = Cursor::new(buf);
        let rpc_id = read_string(&mut r)?;
        let status_raw = r.read_u32::<BigEndian>()?;
        let response_status = Status::try_from(status_raw)?;
        let response_data = read_bytes(&mut r)?.to_vec();
        let error_message = read_string(&mut r)?;
        let traceinfo = read_option(&mut r, TraceInfo::from_cursor)?;

        Ok(RPCResponse {
            rpc_id,
            response_status,
            response_data,
            error_message,
            traceinfo,
        })
    }

    /// Serialises this response into `buf`.
    pub fn serialise_into<W: Write>(&self, buf: &mut W) -> std::io::Result<()> {
        write_string(buf, &self.rpc_id)?;
        buf.write_u32::<BigEndian>(self.response_status.as_u32())?;
        write_bytes(buf, &self.response_data)?;
        write_string(buf, &self.error_message)?;
        write_option(buf, &self.traceinfo, |b, t| t.serialise_into(b))?;
        Ok(())
    }

    /// Returns the on-wire length of this response once serialised.
    pub fn serialised_len(&self) -> u32 {
        string_len(&self.rpc_id)
            + 4
            + bytes_len(&self.response_data)
            + string_len(&self.error_message)
            + option_len(
                self.traceinfo.is_some(),
                self.traceinfo
                    .as_ref()
                    .map(TraceInfo::serialised_len)
                    .unwrap_or(0),
            )
    }

    /// Serialises this response, choosing a stack buffer for small payloads
    /// (below [`SMALL_RESPONSE_THRESHOLD`]) and a heap allocation otherwise.
    pub fn encode(&self) -> ResponseBuffer {
        let len = self.serialised_len() as usize;
        if len <= SMALL_RESPONSE_THRESHOLD {
            let mut buf = [0u8; SMALL_RESPONSE_THRESHOLD];
            let mut cursor = Cursor::new(&mut buf[..]);
            self.serialise_into(&mut cursor)
                .expect("encoding into a correctly-sized stack buffer cannot fail");
            ResponseBuffer::Inline(buf, len)
        } else {
            let mut v = Vec::with_capacity(len);
            self.serialise_into(&mut v)
                .expect("encoding into a Vec cannot fail");
            ResponseBuffer::Heap(v)
        }
    }
}

/// The serialised form of an [`RPCResponse`], either stack- or
/// heap-allocated depending on size. See [`RPCResponse::encode`].
#[derive(Debug)]
pub enum ResponseBuffer {
    /// The response fit within [`SMALL_RESPONSE_THRESHOLD`] bytes.
    Inline([u8; SMALL_RESPONSE_THRESHOLD], usize),
    /// The response was too large for the inline buffer.
    Heap(Vec<u8>),
}

impl AsRef<[u8]> for ResponseBuffer {
    fn as_ref(&self) -> &[u8] {
        match self {
            ResponseBuffer::Inline(buf, len) => &buf[..*len],
            ResponseBuffer::Heap(v) => v.as_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    fn sample_request() -> RPCRequest {
        RPCRequest {
            rpc_id: "r-1".into(),
            srvc: "echo".into(),
            procedure: "any".into(),
            data: b"hello".to_vec(),
            deadline: Some(1_700_000_000_000_000),
            caller_id: Some("caller".into()),
            want_trace: Some(true),
        }
    }

    #[test]
    fn request_round_trips() {
        let req = sample_request();
        let mut buf = Vec::new();
        req.serialise_into(&mut buf).unwrap();
        assert_eq!(buf.len(), req.serialised_len() as usize);

        let got = RPCRequest::from_bytes(&buf).unwrap();
        assert_eq!(got, req);
    }

    #[test]
    fn request_round_trips_with_all_optionals_absent() {
        let req = RPCRequest {
            rpc_id: "r-2".into(),
            srvc: "svc".into(),
            procedure: "proc".into(),
            data: vec![],
            deadline: None,
            caller_id: None,
            want_trace: None,
        };
        let mut buf = Vec::new();
        req.serialise_into(&mut buf).unwrap();
        let got = RPCRequest::from_bytes(&buf).unwrap();
        assert_eq!(got, req);
        assert!(!got.wants_trace());
    }

    #[test]
    fn response_round_trips_without_trace() {
        let resp = RPCResponse {
            rpc_id: "r-1".into(),
            response_status: Status::Ok,
            response_data: b"hello".to_vec(),
            error_message: String::new(),
            traceinfo: None,
        };
        let mut buf = Vec::new();
        resp.serialise_into(&mut buf).unwrap();
        let got = RPCResponse::from_bytes(&buf).unwrap();
        assert_eq!(got, resp);
    }

    #[test]
    fn response_round_trips_with_trace() {
        let resp = RPCResponse {
            rpc_id: "r-1".into(),
            response_status: Status::Ok,
            response_data: b"hello".to_vec(),
            error_message: String::new(),
            traceinfo: Some(TraceInfo {
                received_time: 10,
                replied_time: 20,
                machine_name: "host-1".into(),
                endpoint_name: "echo.any".into(),
                error_message: String::new(),
                redirect: String::new(),
                child_calls: vec![],
            }),
        };
        let mut buf = Vec::new();
        resp.serialise_into(&mut buf).unwrap();
        let got = RPCResponse::from_bytes(&buf).unwrap();
        assert_eq!(got, resp);
    }

    #[test]
    fn zero_length_response_data_round_trips() {
        let resp = RPCResponse {
            rpc_id: "r-3".into(),
            response_status: Status::NotFound,
            response_data: vec![],
            error_message: "no handler could be found".into(),
            traceinfo: None,
        };
        let mut buf = Vec::new();
        resp.serialise_into(&mut buf).unwrap();
        let got = RPCResponse::from_bytes(&buf).unwrap();
        assert_eq!(got.response_data, Vec::<u8>::new());
        assert_eq!(got, resp);
    }

    #[test]
    fn encode_picks_inline_buffer_below_threshold() {
        let resp = RPCResponse {
            rpc_id: "r".into(),
            response_status: Status::Ok,
            response_data: vec![0u8; 10],
            error_message: String::new(),
            traceinfo: None,
        };
        assert!(matches!(resp.encode(), ResponseBuffer::Inline(_, _)));
    }

    #[test]
    fn encode_picks_heap_buffer_above_threshold() {
        let resp = RPCResponse {
            rpc_id: "r".into(),
            response_status: Status::Ok,
            response_data: vec![0u8; 10_000],
            error_message: String::new(),
            traceinfo: None,
        };
        assert!(matches!(resp.encode(), ResponseBuffer::Heap(_)));
    }

    #[test]
    fn encode_boundary_sizes_match_threshold() {
        for data_len in [109, 110, 111, 112, 9_900] {
            let resp = RPCResponse {
                rpc_id: "r".into(),
                response_status: Status::Ok,
                response_data: vec![7u8; data_len],
                error_message: String::new(),
                traceinfo: None,
            };
            let want_inline = resp.serialised_len() as usize <= SMALL_RESPONSE_THRESHOLD;
            let got_inline = matches!(resp.encode(), ResponseBuffer::Inline(_, _));
            assert_eq!(want_inline, got_inline, "data_len={data_len}");

            let decoded = RPCResponse::from_bytes(resp.encode().as_ref()).unwrap();
            assert_eq!(decoded, resp);
        }
    }

    #[test]
    fn request_matches_known_wire_bytes() {
        // rpc_id="r1", srvc="s", procedure="p", data="", deadline=None,
        // caller_id=None, want_trace=Some(true), each field a 4-byte
        // big-endian length prefix followed by its bytes, then the two
        // 1-byte option flags and the trailing trace-flag byte.
        let raw = hex!("000000027231000000017300000001700000000000000101");
        let req = RPCRequest {
            rpc_id: "r1".into(),
            srvc: "s".into(),
            procedure: "p".into(),
            data: vec![],
            deadline: None,
            caller_id: None,
            want_trace: Some(true),
        };

        let mut buf = Vec::new();
        req.serialise_into(&mut buf).unwrap();
        assert_eq!(buf, raw);

        let decoded = RPCRequest::from_bytes(&raw).unwrap();
        assert_eq!(decoded, req);
    }
}
