//! Frame header helpers.
//!
//! The length prefix is a `u64` in **native** byte order, matching
//! what the existing C clients write with a raw `unsigned long`.
//! Async send/receive on sockets lives in the server crate; this
//! module only deals with byte buffers.

use crate::error::ProtocolError;

/// Size of the length prefix.
pub const HEADER_LEN: usize = 8;

pub fn encode_header(len: usize) -> [u8; HEADER_LEN] {
    (len as u64).to_ne_bytes()
}

pub fn decode_header(header: [u8; HEADER_LEN]) -> u64 {
    u64::from_ne_bytes(header)
}

/// Check a decoded length against `max` and convert it to `usize`.
pub fn checked_len(len: u64, max: usize) -> Result<usize, ProtocolError> {
    match usize::try_from(len) {
        Ok(n) if n <= max => Ok(n),
        _ => Err(ProtocolError::FrameTooLarge { len, max }),
    }
}

/// Append a full frame (header + payload) to `out`.
pub fn encode_frame(payload: &[u8], out: &mut Vec<u8>) {
    out.reserve(HEADER_LEN + payload.len());
    out.extend_from_slice(&encode_header(payload.len()));
    out.extend_from_slice(payload);
}
