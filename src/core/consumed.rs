//! # Consumption Calculator
//!
//! Size of an encoded record derived from offsets and prefixes alone.
//!
//! Because payloads are laid out back to back in declaration order, a record
//! ends where the payload of its last present variable field ends. Only that
//! payload is followed; fixed-width collections are skipped arithmetically.
//! The calculation trusts the canonical layout, so it is meant for buffers this
//! encoder produced or that already passed validation. On anything else it
//! still never reads out of bounds, but the answer is only as good as the input.

use crate::config::CodecConfig;
use crate::core::bitmask::NullBitmask;
use crate::core::layout::{RecordLayout, Shape};
use crate::core::region::RegionReader;
use crate::core::varint::{read_length, read_varint, take};
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::SchemaRegistry;
use std::sync::Arc;

#[derive(Debug, Clone, Copy)]
struct Consumption<'a> {
    buf: &'a [u8],
    registry: &'a SchemaRegistry,
    config: &'a CodecConfig,
}

impl Consumption<'_> {
    fn record_end(&self, layout: &Arc<RecordLayout>, start: usize, depth: usize) -> Result<usize> {
        if depth > self.config.depth_limit() {
            return Err(ProtocolError::DepthExceeded {
                depth,
                max_depth: self.config.depth_limit(),
            });
        }

        let fixed = layout.fixed_block_size();
        take(self.buf, start, fixed)?;
        let mask = NullBitmask::read(self.buf, start, layout.nullable_count())?;
        let placements = layout.placements();

        let last_present = layout
            .variable_fields()
            .iter()
            .rev()
            .copied()
            .find(|&index| mask.field_present(placements[index].null_bit));

        match last_present {
            None => Ok(start + fixed),
            Some(index) => {
                let region = RegionReader::new(start, fixed);
                let at = region.payload_position(self.buf, placements[index].position)?;
                self.payload_end(layout.fields()[index].kind().shape(), at, layout, depth)
            }
        }
    }

    fn payload_end(
        &self,
        shape: Shape<'_>,
        at: usize,
        enclosing: &Arc<RecordLayout>,
        depth: usize,
    ) -> Result<usize> {
        match shape {
            Shape::Primitive(ty) => end_of(self.buf, at, ty.width()),
            Shape::Enum(_) => end_of(self.buf, at, 1),
            Shape::String => {
                let (len, prefix) = read_length(self.buf, at, self.config.max_string_len)?;
                end_of(self.buf, at + prefix, len)
            }
            Shape::Record(layout) => self.record_end(layout, at, depth + 1),
            Shape::RecursiveSelf => self.record_end(enclosing, at, depth + 1),
            Shape::Variant(table) => {
                let (type_id, prefix) = read_varint(self.buf, at)?;
                let layout = self.registry.resolve_variant(table, type_id)?;
                self.record_end(layout, at + prefix, depth + 1)
            }
            Shape::Collection(element) => {
                let (count, prefix) = read_length(self.buf, at, self.config.max_collection_len)?;
                let mut cursor = at + prefix;
                if let Some(width) = element.fixed_width() {
                    return end_of(self.buf, cursor, count.saturating_mul(width));
                }
                for _ in 0..count {
                    cursor = self.payload_end(element.shape(), cursor, enclosing, depth)?;
                }
                Ok(cursor)
            }
            Shape::Map(key, val) => {
                let (count, prefix) = read_length(self.buf, at, self.config.max_collection_len)?;
                let mut cursor = at + prefix;
                if let (Some(k), Some(v)) = (key.fixed_width(), val.fixed_width()) {
                    return end_of(self.buf, cursor, count.saturating_mul(k + v));
                }
                for _ in 0..count {
                    cursor = self.payload_end(key.shape(), cursor, enclosing, depth)?;
                    cursor = self.payload_end(val.shape(), cursor, enclosing, depth)?;
                }
                Ok(cursor)
            }
        }
    }
}

#[inline]
fn end_of(buf: &[u8], at: usize, len: usize) -> Result<usize> {
    take(buf, at, len).map(|_| at + len)
}

/// Bytes the record of `layout` at `offset` occupies
pub fn bytes_consumed(
    registry: &SchemaRegistry,
    config: &CodecConfig,
    layout: &Arc<RecordLayout>,
    buf: &[u8],
    offset: usize,
) -> Result<usize> {
    let calc = Consumption {
        buf,
        registry,
        config,
    };
    Ok(calc.record_end(layout, offset, 0)? - offset)
}
