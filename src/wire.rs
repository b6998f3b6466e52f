//! Length-prefixed field encoding shared by [`crate::RPCRequest`],
//! [`crate::RPCResponse`] and [`crate::TraceInfo`].
//!
//! Every variable-length field on the wire is a big-endian `u32` length
//! prefix followed by that many raw bytes - no padding, unlike the XDR
//! `opaque` type this is descended from (RFC 1014 §3.9's 4-byte alignment
//! requirement doesn't apply to this protocol).

use std::io::{Cursor, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::Error;

/// Largest length prefix this crate will honour for a single field. Guards
/// against a corrupt or adversarial length prefix driving a huge allocation.
const MAX_FIELD_LEN: u32 = 64 * 1024 * 1024;

/// Reads a length-prefixed byte string from `r`.
pub(crate) fn read_bytes<'a>(r: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let len = r.read_u32::<BigEndian>()?;
    if len > MAX_FIELD_LEN {
        return Err(Error::FieldTooLarge(len));
    }

    let data = *r.get_ref();
    let start = r.position() as usize;
    let end = start
        .checked_add(len as usize)
        .ok_or(Error::FieldTooLarge(len))?;
    if end > data.len() {
        return Err(Error::Truncated {
            buffer_len: data.len(),
            expected: end,
        });
    }

    r.set_position(end as u64);
    Ok(&data[start..end])
}

/// Reads a length-prefixed UTF-8 string from `r`.
pub(crate) fn read_string(r: &mut Cursor<&[u8]>) -> Result<String, Error> {
    let raw = read_bytes(r)?;
    Ok(std::str::from_utf8(raw)?.to_owned())
}

/// Reads an optional field: a one-byte presence flag followed by `read` if
/// the flag is non-zero.
pub(crate) fn read_option<T>(
    r: &mut Cursor<&[u8]>,
    read: impl FnOnce(&mut Cursor<&[u8]>) -> Result<T, Error>,
) -> Result<Option<T>, Error> {
    match r.read_u8()? {
        0 => Ok(None),
        _ => Ok(Some(read(r)?)),
    }
}

/// Writes a length-prefixed byte string into `buf`.
pub(crate) fn write_bytes<W: Write>(buf: &mut W, data: &[u8]) -> std::io::Result<()> {
    buf.write_u32::<BigEndian>(data.len() as u32)?;
    buf.write_all(data)
}

/// Writes a length-prefixed UTF-8 string into `buf`.
pub(crate) fn write_string<W: Write>(buf: &mut W, s: &str) -> std::io::Result<()> {
    write_bytes(buf, s.as_bytes())
}

/// Writes an optional field as a one-byte presence flag, followed by `write`
/// if `value` is `Some`.
pub(crate) fn write_option<W: Write, T>(
    buf: &mut W,
    value: &Option<T>,
    write: impl FnOnce(&mut W, &T) -> std::io::Result<()>,
) -> std::io::Result<()> {
    match value {
        None => buf.write_u8(0),
        Some(v) => {
            buf.write_u8(1)?;
            write(buf, v)
        }
    }
}

/// Returns the serialised length of a length-prefixed byte string.
pub(crate) fn bytes_len(data: &[u8]) -> u32 {
    4 + data.len() as u32
}

/// Returns the serialised length of a length-prefixed UTF-8 string.
pub(crate) fn string_len(s: &str) -> u32 {
    bytes_len(s.as_bytes())
}

/// Returns the serialised length of an optional field, given the length of
/// `T`'s encoding when present.
pub(crate) fn option_len(present: bool, inner_len: u32) -> u32 {
    1 + if present { inner_len } else { 0 }
}
