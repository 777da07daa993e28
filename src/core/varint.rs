//! # VarInt and Bounded Byte Access
//!
//! Unsigned LEB128 integers for lengths, counts and variant type ids, plus the
//! bounds-checked slice helpers every reader in the codec goes through.
//!
//! ## Wire Format
//! ```text
//! 300  -> [0xAC, 0x02]
//! low 7 bits first, high bit set on every byte except the last
//! ```
//!
//! A VarInt carries a `u32`, so it is at most 5 bytes long. The 5th byte may
//! only use its low 4 bits.

use crate::config::WIRE_LENGTH_CAPACITY;
use crate::error::{ProtocolError, Result};
use bytes::BufMut;

/// Maximum encoded length of a VarInt
pub const VARINT_MAX_LEN: usize = 5;

const CONTINUATION: u8 = 0x80;
const PAYLOAD_MASK: u8 = 0x7F;

/// Number of bytes `value` occupies on the wire
#[inline]
pub fn varint_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Append `value` as a VarInt
#[inline]
pub fn put_varint<B: BufMut>(buf: &mut B, mut value: u32) {
    while value >= u32::from(CONTINUATION) {
        buf.put_u8((value as u8 & PAYLOAD_MASK) | CONTINUATION);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read a VarInt at `position`, returning the value and its encoded length
pub fn read_varint(buf: &[u8], position: usize) -> Result<(u32, usize)> {
    let mut value = 0u32;
    for i in 0..VARINT_MAX_LEN {
        let at = position.saturating_add(i);
        let byte = *buf.get(at).ok_or(ProtocolError::TruncatedInput {
            position: at,
            needed: 1,
            available: 0,
        })?;

        // The fifth group holds bits 28..32 only, and it ends the integer.
        if i == VARINT_MAX_LEN - 1 && byte & 0xF0 != 0 {
            return Err(ProtocolError::MalformedVarInt { position });
        }

        value |= u32::from(byte & PAYLOAD_MASK) << (7 * i);
        if byte & CONTINUATION == 0 {
            return Ok((value, i + 1));
        }
    }
    Err(ProtocolError::MalformedVarInt { position })
}

/// Read a length or count prefix and check it against `limit` and the wire capacity
pub fn read_length(buf: &[u8], position: usize, limit: usize) -> Result<(usize, usize)> {
    let (raw, prefix_len) = read_varint(buf, position)?;
    let length = raw as usize;
    check_length(length, limit)?;
    Ok((length, prefix_len))
}

/// Reject a length larger than `limit` or than the wire format can carry
#[inline]
pub fn check_length(length: usize, limit: usize) -> Result<()> {
    let capacity = limit.min(WIRE_LENGTH_CAPACITY);
    if length > capacity {
        return Err(ProtocolError::LengthExceedsCapacity { length, capacity });
    }
    Ok(())
}

/// Borrow `len` bytes at `position`, or fail with `TruncatedInput`
#[inline]
pub fn take(buf: &[u8], position: usize, len: usize) -> Result<&[u8]> {
    match position.checked_add(len) {
        Some(end) if end <= buf.len() => Ok(&buf[position..end]),
        _ => Err(ProtocolError::TruncatedInput {
            position,
            needed: len,
            available: buf.len().saturating_sub(position),
        }),
    }
}

/// Read a little-endian `u32` at `position`
#[inline]
pub fn read_u32_le(buf: &[u8], position: usize) -> Result<u32> {
    let bytes = take(buf, position, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
