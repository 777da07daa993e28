//! # Record Walker
//!
//! One traversal of an encoded record that both decode and validation run.
//! What the walk produces is decided by a [`Sink`]: the materializing sink
//! builds [`Value`]s, the inspecting sink produces `()` everywhere and so never
//! allocates. Every structural check lives in the walker, which is why a buffer
//! validates exactly when it decodes.
//!
//! ## Checks Per Record
//! - the fixed block fits in the buffer
//! - unused bitmask bits are zero
//! - enum bytes are in range
//! - each present variable field's slot holds the canonical offset
//! - every payload fits, with well-formed VarInt prefixes within limits
//! - strings are UTF-8
//! - variant type ids are registered before their payload is read
//! - nesting stays within `max_depth`

use crate::config::CodecConfig;
use crate::core::bitmask::NullBitmask;
use crate::core::layout::{PrimitiveType, RecordLayout, Shape};
use crate::core::region::RegionReader;
use crate::core::value::{Record, Value, VariantValue};
use crate::core::varint::{read_length, read_varint, take};
use crate::error::{ProtocolError, Result};
use crate::protocol::registry::SchemaRegistry;
use std::sync::Arc;

/// Upper bound on capacity reserved up front from a wire count
const PREALLOC_LIMIT: usize = 4096;

/// Receiver of the pieces a walk discovers
pub(crate) trait Sink {
    type Value;
    type Record;
    type List;
    type Map;

    fn primitive(ty: PrimitiveType, bytes: &[u8]) -> Self::Value;
    fn enumeration(raw: u8) -> Self::Value;
    fn string(s: &str) -> Self::Value;

    fn new_record(layout: &Arc<RecordLayout>) -> Self::Record;
    fn set_field(record: &mut Self::Record, index: usize, value: Self::Value);
    fn record(record: Self::Record) -> Self::Value;
    fn variant(type_id: u32, record: Self::Record) -> Self::Value;

    fn new_list(count: usize) -> Self::List;
    fn push(list: &mut Self::List, value: Self::Value);
    fn list(list: Self::List) -> Self::Value;

    fn new_map(count: usize) -> Self::Map;
    fn insert(map: &mut Self::Map, key: Self::Value, value: Self::Value);
    fn map(map: Self::Map) -> Self::Value;
}

/// Sink that builds decoded values
pub(crate) struct Materialize;

impl Sink for Materialize {
    type Value = Value;
    type Record = Record;
    type List = Vec<Value>;
    type Map = Vec<(Value, Value)>;

    fn primitive(ty: PrimitiveType, bytes: &[u8]) -> Value {
        ty.read(bytes)
    }

    fn enumeration(raw: u8) -> Value {
        Value::Enum(raw)
    }

    fn string(s: &str) -> Value {
        Value::String(s.to_owned())
    }

    fn new_record(layout: &Arc<RecordLayout>) -> Record {
        Record::empty(layout)
    }

    fn set_field(record: &mut Record, index: usize, value: Value) {
        record.set_index(index, value);
    }

    fn record(record: Record) -> Value {
        Value::Record(record)
    }

    fn variant(type_id: u32, record: Record) -> Value {
        Value::Variant(VariantValue::new(type_id, record))
    }

    fn new_list(count: usize) -> Vec<Value> {
        Vec::with_capacity(count.min(PREALLOC_LIMIT))
    }

    fn push(list: &mut Vec<Value>, value: Value) {
        list.push(value);
    }

    fn list(list: Vec<Value>) -> Value {
        Value::List(list)
    }

    fn new_map(count: usize) -> Vec<(Value, Value)> {
        Vec::with_capacity(count.min(PREALLOC_LIMIT))
    }

    fn insert(map: &mut Vec<(Value, Value)>, key: Value, value: Value) {
        map.push((key, value));
    }

    fn map(map: Vec<(Value, Value)>) -> Value {
        Value::Map(map)
    }
}

/// Read-only walk over one buffer
#[derive(Debug, Clone, Copy)]
pub(crate) struct Walker<'a> {
    buf: &'a [u8],
    registry: &'a SchemaRegistry,
    config: &'a CodecConfig,
}

impl<'a> Walker<'a> {
    pub(crate) fn new(buf: &'a [u8], registry: &'a SchemaRegistry, config: &'a CodecConfig) -> Self {
        Self {
            buf,
            registry,
            config,
        }
    }

    /// Walk the record of `layout` starting at `start`.
    ///
    /// Returns what the sink built and the absolute end of the record.
    pub(crate) fn record<S: Sink>(
        &self,
        layout: &Arc<RecordLayout>,
        start: usize,
        depth: usize,
    ) -> Result<(S::Record, usize)> {
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
        let mut record = S::new_record(layout);

        for &index in layout.fixed_fields() {
            let placement = placements[index];
            if !mask.field_present(placement.null_bit) {
                continue;
            }
            let at = start + placement.position;
            let (value, _) =
                self.value::<S>(layout.fields()[index].kind().shape(), at, layout, depth)?;
            S::set_field(&mut record, index, value);
        }

        let mut region = RegionReader::new(start, fixed);
        for &index in layout.variable_fields() {
            let placement = placements[index];
            if !mask.field_present(placement.null_bit) {
                continue;
            }
            let at = region.seek_field(self.buf, placement.position)?;
            let (value, end) =
                self.value::<S>(layout.fields()[index].kind().shape(), at, layout, depth)?;
            region.advance(end);
            S::set_field(&mut record, index, value);
        }

        Ok((record, region.end()))
    }

    /// A self-describing value at `at`; returns it and its absolute end
    pub(crate) fn value<S: Sink>(
        &self,
        shape: Shape<'_>,
        at: usize,
        enclosing: &Arc<RecordLayout>,
        depth: usize,
    ) -> Result<(S::Value, usize)> {
        match shape {
            Shape::Primitive(ty) => {
                let bytes = take(self.buf, at, ty.width())?;
                Ok((S::primitive(ty, bytes), at + ty.width()))
            }
            Shape::Enum(desc) => {
                let raw = take(self.buf, at, 1)?[0];
                if !desc.contains(raw) {
                    return Err(ProtocolError::InvalidEnumValue {
                        position: at,
                        value: raw,
                        variant_count: desc.variant_count(),
                    });
                }
                Ok((S::enumeration(raw), at + 1))
            }
            Shape::String => {
                let (len, prefix) = read_length(self.buf, at, self.config.max_string_len)?;
                let body = at + prefix;
                let bytes = take(self.buf, body, len)?;
                let s = std::str::from_utf8(bytes)
                    .map_err(|_| ProtocolError::InvalidUtf8 { position: body })?;
                Ok((S::string(s), body + len))
            }
            Shape::Record(layout) => {
                let (record, end) = self.record::<S>(layout, at, depth + 1)?;
                Ok((S::record(record), end))
            }
            Shape::RecursiveSelf => {
                let (record, end) = self.record::<S>(enclosing, at, depth + 1)?;
                Ok((S::record(record), end))
            }
            Shape::Variant(table) => {
                let (type_id, prefix) = read_varint(self.buf, at)?;
                let layout = self.registry.resolve_variant(table, type_id)?;
                let (record, end) = self.record::<S>(layout, at + prefix, depth + 1)?;
                Ok((S::variant(type_id, record), end))
            }
            Shape::Collection(element) => {
                let (count, prefix) = read_length(self.buf, at, self.config.max_collection_len)?;
                let mut cursor = at + prefix;
                self.ensure_room(cursor, count, element.min_wire_size(enclosing))?;

                let mut list = S::new_list(count);
                for _ in 0..count {
                    let (item, end) = self.value::<S>(element.shape(), cursor, enclosing, depth)?;
                    S::push(&mut list, item);
                    cursor = end;
                }
                Ok((S::list(list), cursor))
            }
            Shape::Map(key, val) => {
                let (count, prefix) = read_length(self.buf, at, self.config.max_collection_len)?;
                let mut cursor = at + prefix;
                let entry = key.min_wire_size(enclosing) + val.min_wire_size(enclosing);
                self.ensure_room(cursor, count, entry)?;

                let mut map = S::new_map(count);
                for _ in 0..count {
                    let (k, end) = self.value::<S>(key.shape(), cursor, enclosing, depth)?;
                    let (v, end) = self.value::<S>(val.shape(), end, enclosing, depth)?;
                    S::insert(&mut map, k, v);
                    cursor = end;
                }
                Ok((S::map(map), cursor))
            }
        }
    }

    /// Reject a count whose smallest possible encoding already overruns the buffer
    fn ensure_room(&self, at: usize, count: usize, min_each: usize) -> Result<()> {
        let needed = count.saturating_mul(min_each);
        take(self.buf, at, needed).map(|_| ())
    }
}

/// Decode the record of `layout` at `offset`, returning it and the bytes consumed
pub fn decode_record(
    registry: &SchemaRegistry,
    config: &CodecConfig,
    layout: &Arc<RecordLayout>,
    buf: &[u8],
    offset: usize,
) -> Result<(Record, usize)> {
    let (record, end) = Walker::new(buf, registry, config).record::<Materialize>(layout, offset, 0)?;
    Ok((record, end - offset))
}
