//! Variable region bookkeeping.
//!
//! Payloads of present variable fields are appended in declaration order
//! right after the fixed block. Each field's offset slot holds the payload
//! position relative to the start of the variable region.
//!
//! Readers accept only the canonical layout the writer produces: the first
//! present payload starts at offset 0 and every later one starts where the
//! previous one ended. Gaps, overlaps and shared payloads are rejected, which
//! keeps validation linear in the encoded size.

use crate::core::layout::OFFSET_SLOT_WIDTH;
use crate::core::varint::read_u32_le;
use crate::error::{ProtocolError, Result};
use bytes::BytesMut;

/// Encode-side cursor over one record's variable region
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegionWriter {
    record_start: usize,
    region_start: usize,
}

impl RegionWriter {
    /// The fixed block of the record starting at `record_start` must already be reserved
    pub(crate) fn new(record_start: usize, fixed_block_size: usize) -> Self {
        Self {
            record_start,
            region_start: record_start + fixed_block_size,
        }
    }

    /// Point the slot at `slot_position` to the current end of `out`.
    ///
    /// Call right before appending the field's payload.
    pub(crate) fn open_field(&self, out: &mut BytesMut, slot_position: usize) -> Result<()> {
        let offset = out.len() - self.region_start;
        let raw = u32::try_from(offset).map_err(|_| ProtocolError::LengthExceedsCapacity {
            length: offset,
            capacity: u32::MAX as usize,
        })?;
        let at = self.record_start + slot_position;
        out[at..at + OFFSET_SLOT_WIDTH].copy_from_slice(&raw.to_le_bytes());
        Ok(())
    }
}

/// Decode-side cursor over one record's variable region
#[derive(Debug, Clone, Copy)]
pub(crate) struct RegionReader {
    record_start: usize,
    region_start: usize,
    cursor: usize,
}

impl RegionReader {
    pub(crate) fn new(record_start: usize, fixed_block_size: usize) -> Self {
        let region_start = record_start + fixed_block_size;
        Self {
            record_start,
            region_start,
            cursor: region_start,
        }
    }

    /// Read the slot at `slot_position` and return the absolute payload position.
    ///
    /// # Errors
    /// `InvalidOffset` unless the slot points exactly at the running cursor.
    pub(crate) fn seek_field(&self, buf: &[u8], slot_position: usize) -> Result<usize> {
        let slot_at = self.record_start + slot_position;
        let offset = read_u32_le(buf, slot_at)? as usize;
        let expected = self.cursor - self.region_start;
        if offset != expected {
            return Err(ProtocolError::InvalidOffset {
                position: slot_at,
                offset,
                expected,
            });
        }
        Ok(self.cursor)
    }

    /// Move the cursor past a payload that ends at `end`
    pub(crate) fn advance(&mut self, end: usize) {
        self.cursor = end;
    }

    /// Absolute end of everything read so far
    pub(crate) fn end(&self) -> usize {
        self.cursor
    }

    /// Absolute payload position stored in a slot, checked only against the buffer.
    ///
    /// Used by the consumption calculator, which trusts the canonical layout.
    pub(crate) fn payload_position(&self, buf: &[u8], slot_position: usize) -> Result<usize> {
        let slot_at = self.record_start + slot_position;
        let offset = read_u32_le(buf, slot_at)? as usize;
        match self.region_start.checked_add(offset) {
            Some(position) if position <= buf.len() => Ok(position),
            _ => Err(ProtocolError::InvalidOffset {
                position: slot_at,
                offset,
                expected: buf.len().saturating_sub(self.region_start),
            }),
        }
    }
}
