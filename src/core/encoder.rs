//! # Record Encoder
//!
//! Writes a [`Record`] against its layout:
//!
//! ```text
//! [NullBitmask] [fixed fields] [offset slots] [variable payloads...]
//! ```
//!
//! Encoding runs in two passes. The sizing pass walks the whole value and
//! checks depth, length capacity, enum ranges, variant registration and
//! layout conformance. Only when it succeeds are bytes written, so a failed
//! encode never leaves partial output behind.

use crate::config::CodecConfig;
use crate::core::bitmask::set_present;
use crate::core::layout::{FieldKind, RecordLayout, Shape};
use crate::core::region::RegionWriter;
use crate::core::value::{Record, Value};
use crate::core::varint::{check_length, put_varint, varint_len};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::registry::SchemaRegistry;
use bytes::{BufMut, BytesMut};
use std::sync::Arc;

/// Shared state of one encode or sizing call
#[derive(Debug, Clone, Copy)]
pub(crate) struct Encoder<'a> {
    registry: &'a SchemaRegistry,
    config: &'a CodecConfig,
}

impl<'a> Encoder<'a> {
    pub(crate) fn new(registry: &'a SchemaRegistry, config: &'a CodecConfig) -> Self {
        Self { registry, config }
    }

    #[inline]
    fn enter(&self, depth: usize) -> Result<()> {
        if depth > self.config.depth_limit() {
            return Err(ProtocolError::DepthExceeded {
                depth,
                max_depth: self.config.depth_limit(),
            });
        }
        Ok(())
    }

    /// Encoded size of `record` at nesting `depth`, checking everything the writer relies on
    pub(crate) fn record_size(&self, record: &Record, depth: usize) -> Result<usize> {
        self.enter(depth)?;
        let layout = record.layout();
        let mut size = layout.fixed_block_size();

        for (field, value) in layout.fields().iter().zip(record.values()) {
            let Some(value) = value else {
                if field.is_nullable() {
                    continue;
                }
                return Err(mismatch(layout, field.name(), constants::ERR_MISSING_FIELD));
            };

            if !value.fits(field.kind().shape(), layout) {
                return Err(mismatch(layout, field.name(), constants::ERR_WRONG_SHAPE));
            }

            match field.kind() {
                FieldKind::FixedEmbedded(_) => {
                    // Lives inside the fixed block; only its contents need checking.
                    if let Value::Record(inner) = value {
                        self.record_size(inner, depth + 1)?;
                    }
                }
                kind if kind.is_fixed() => {}
                kind => size += self.value_size(kind.shape(), value, layout, depth)?,
            }
        }

        Ok(size)
    }

    fn value_size(
        &self,
        shape: Shape<'_>,
        value: &Value,
        enclosing: &Arc<RecordLayout>,
        depth: usize,
    ) -> Result<usize> {
        match (shape, value) {
            (Shape::Primitive(ty), value) if ty.matches(value) => Ok(ty.width()),
            (Shape::Enum(desc), Value::Enum(raw)) if desc.contains(*raw) => Ok(1),
            (Shape::String, Value::String(s)) => {
                check_length(s.len(), self.config.max_string_len)?;
                Ok(varint_len(s.len() as u32) + s.len())
            }
            (Shape::Record(layout), Value::Record(inner)) if inner.layout().same_as(layout) => {
                self.record_size(inner, depth + 1)
            }
            (Shape::RecursiveSelf, Value::Record(inner)) if inner.layout().same_as(enclosing) => {
                self.record_size(inner, depth + 1)
            }
            (Shape::Variant(table), Value::Variant(variant)) => {
                let registered = self.registry.resolve_variant(table, variant.type_id())?;
                if !variant.record().layout().same_as(registered) {
                    return Err(mismatch(
                        registered,
                        "<variant>",
                        constants::ERR_VARIANT_LAYOUT,
                    ));
                }
                Ok(varint_len(variant.type_id()) + self.record_size(variant.record(), depth + 1)?)
            }
            (Shape::Collection(element), Value::List(items)) => {
                check_length(items.len(), self.config.max_collection_len)?;
                let mut size = varint_len(items.len() as u32);
                for item in items {
                    size += self.value_size(element.shape(), item, enclosing, depth)?;
                }
                Ok(size)
            }
            (Shape::Map(key, val), Value::Map(entries)) => {
                check_length(entries.len(), self.config.max_collection_len)?;
                let mut size = varint_len(entries.len() as u32);
                for (k, v) in entries {
                    size += self.value_size(key.shape(), k, enclosing, depth)?;
                    size += self.value_size(val.shape(), v, enclosing, depth)?;
                }
                Ok(size)
            }
            _ => Err(mismatch(enclosing, "<element>", constants::ERR_WRONG_SHAPE)),
        }
    }

    /// Append `record`; must only run after `record_size` succeeded for it
    pub(crate) fn write_record(&self, record: &Record, out: &mut BytesMut) -> Result<()> {
        let layout = record.layout();
        let start = out.len();
        let fixed = layout.fixed_block_size();
        out.put_bytes(0, fixed);
        fill_fixed(record, &mut out[start..start + fixed])?;

        let region = RegionWriter::new(start, fixed);
        for &index in layout.variable_fields() {
            if let Some(value) = record.get_index(index) {
                let placement = layout.placements()[index];
                region.open_field(out, placement.position)?;
                self.write_value(layout.fields()[index].kind().shape(), value, layout, out)?;
            }
        }
        Ok(())
    }

    fn write_value(
        &self,
        shape: Shape<'_>,
        value: &Value,
        enclosing: &Arc<RecordLayout>,
        out: &mut BytesMut,
    ) -> Result<()> {
        match (shape, value) {
            (Shape::Primitive(ty), value) => {
                let at = out.len();
                out.put_bytes(0, ty.width());
                if !ty.write(value, &mut out[at..]) {
                    return Err(mismatch(enclosing, ty.name(), constants::ERR_WRONG_SHAPE));
                }
            }
            (Shape::Enum(_), Value::Enum(raw)) => out.put_u8(*raw),
            (Shape::String, Value::String(s)) => {
                put_varint(out, s.len() as u32);
                out.put_slice(s.as_bytes());
            }
            (Shape::Record(_) | Shape::RecursiveSelf, Value::Record(inner)) => {
                self.write_record(inner, out)?;
            }
            (Shape::Variant(_), Value::Variant(variant)) => {
                put_varint(out, variant.type_id());
                self.write_record(variant.record(), out)?;
            }
            (Shape::Collection(element), Value::List(items)) => {
                put_varint(out, items.len() as u32);
                for item in items {
                    self.write_value(element.shape(), item, enclosing, out)?;
                }
            }
            (Shape::Map(key, val), Value::Map(entries)) => {
                put_varint(out, entries.len() as u32);
                for (k, v) in entries {
                    self.write_value(key.shape(), k, enclosing, out)?;
                    self.write_value(val.shape(), v, enclosing, out)?;
                }
            }
            _ => return Err(mismatch(enclosing, "<element>", constants::ERR_WRONG_SHAPE)),
        }
        Ok(())
    }
}

/// Fill a zeroed fixed block: presence bits, primitives, enums and fixed embeds
fn fill_fixed(record: &Record, block: &mut [u8]) -> Result<()> {
    let layout = record.layout();
    let bitmask_width = layout.bitmask_width();

    for (index, field) in layout.fields().iter().enumerate() {
        let Some(value) = record.get_index(index) else {
            continue;
        };
        let placement = layout.placements()[index];
        if let Some(bit) = placement.null_bit {
            set_present(&mut block[..bitmask_width], bit);
        }

        let at = placement.position;
        match (field.kind(), value) {
            (FieldKind::FixedPrimitive(ty), value) => {
                if !ty.write(value, &mut block[at..at + ty.width()]) {
                    return Err(mismatch(layout, field.name(), constants::ERR_WRONG_SHAPE));
                }
            }
            (FieldKind::FixedEnum(_), Value::Enum(raw)) => block[at] = *raw,
            (FieldKind::FixedEmbedded(inner_layout), Value::Record(inner)) => {
                let width = inner_layout.fixed_block_size();
                fill_fixed(inner, &mut block[at..at + width])?;
            }
            (kind, _) if kind.is_fixed() => {
                return Err(mismatch(layout, field.name(), constants::ERR_WRONG_SHAPE));
            }
            _ => {}
        }
    }
    Ok(())
}

fn mismatch(layout: &RecordLayout, field: &str, reason: &str) -> ProtocolError {
    ProtocolError::SchemaMismatch(format!("{}.{field}: {reason}", layout.name()))
}

/// Encoded size of `record`.
///
/// # Errors
/// `DepthExceeded`, `LengthExceedsCapacity`, `UnknownVariantId` or
/// `SchemaMismatch` when the value cannot be encoded.
pub fn size_of(registry: &SchemaRegistry, config: &CodecConfig, record: &Record) -> Result<usize> {
    Encoder::new(registry, config).record_size(record, 0)
}

/// Append the encoding of `record` to `out` and return the bytes written.
///
/// On error `out` is left exactly as it was.
pub fn encode_record(
    registry: &SchemaRegistry,
    config: &CodecConfig,
    record: &Record,
    out: &mut BytesMut,
) -> Result<usize> {
    let encoder = Encoder::new(registry, config);
    let size = encoder.record_size(record, 0)?;

    let start = out.len();
    out.reserve(size);
    if let Err(e) = encoder.write_record(record, out) {
        out.truncate(start);
        return Err(e);
    }

    debug_assert_eq!(out.len() - start, size);
    Ok(out.len() - start)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::layout::{DispatchTableId, ElementKind, PrimitiveType};
    use crate::core::value::VariantValue;
    use crate::error::ErrorKind;
    use crate::protocol::dispatcher::DispatchTable;

    fn empty_registry() -> SchemaRegistry {
        SchemaRegistry::builder().build().unwrap()
    }

    fn label_layout() -> Arc<RecordLayout> {
        RecordLayout::builder("Label")
            .optional("text", FieldKind::VariableString)
            .build()
            .unwrap()
    }

    #[test]
    fn test_absent_string_is_fixed_block_only() {
        let layout = label_layout();
        let record = Record::builder(&layout).build().unwrap();
        let mut out = BytesMut::new();
        let written =
            encode_record(&empty_registry(), &CodecConfig::default(), &record, &mut out).unwrap();

        assert_eq!(written, layout.fixed_block_size());
        assert_eq!(&out[..], &[0x00, 0, 0, 0, 0]);
    }

    #[test]
    fn test_present_string_layout() {
        let layout = label_layout();
        let record = Record::builder(&layout)
            .set("text", Value::string("abc"))
            .unwrap()
            .build()
            .unwrap();
        let mut out = BytesMut::new();
        encode_record(&empty_registry(), &CodecConfig::default(), &record, &mut out).unwrap();

        assert_eq!(&out[..], &[0x01, 0, 0, 0, 0, 0x03, b'a', b'b', b'c']);
    }

    #[test]
    fn test_fixed_embed_written_inline() {
        let point = RecordLayout::builder("Point")
            .optional("x", FieldKind::FixedPrimitive(PrimitiveType::I16))
            .build()
            .unwrap();
        let outer = RecordLayout::builder("Outer")
            .field("at", FieldKind::FixedEmbedded(Arc::clone(&point)))
            .field("flag", FieldKind::FixedPrimitive(PrimitiveType::Bool))
            .build()
            .unwrap();

        let inner = Record::builder(&point)
            .set("x", Value::I16(-2))
            .unwrap()
            .build()
            .unwrap();
        let record = Record::builder(&outer)
            .set("at", Value::Record(inner))
            .unwrap()
            .set("flag", Value::Bool(true))
            .unwrap()
            .build()
            .unwrap();

        let mut out = BytesMut::new();
        encode_record(&empty_registry(), &CodecConfig::default(), &record, &mut out).unwrap();
        assert_eq!(&out[..], &[0x01, 0xFE, 0xFF, 0x01]);
    }

    #[test]
    fn test_depth_checked_before_writing() {
        let chain = RecordLayout::builder("Chain")
            .optional("parent", FieldKind::RecursiveSelf)
            .build()
            .unwrap();
        let mut record = Record::builder(&chain).build().unwrap();
        for _ in 0..5 {
            record = Record::builder(&chain)
                .set("parent", Value::Record(record))
                .unwrap()
                .build()
                .unwrap();
        }

        let config = CodecConfig::default().with_max_depth(3);
        let mut out = BytesMut::from(&b"keep"[..]);
        let err = encode_record(&empty_registry(), &config, &record, &mut out).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DepthExceeded);
        assert_eq!(&out[..], b"keep");
    }

    #[test]
    fn test_oversized_collection_rejected() {
        let layout = RecordLayout::builder("Bag")
            .field(
                "items",
                FieldKind::VariableCollection(ElementKind::Primitive(PrimitiveType::U8)),
            )
            .build()
            .unwrap();
        let record = Record::builder(&layout)
            .set("items", Value::List(vec![Value::U8(1); 4]))
            .unwrap()
            .build()
            .unwrap();
        let config = CodecConfig {
            max_collection_len: 3,
            ..CodecConfig::default()
        };
        let err = size_of(&empty_registry(), &config, &record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::LengthExceedsCapacity);
    }

    #[test]
    fn test_wrong_element_shape_rejected() {
        let layout = RecordLayout::builder("Bag")
            .field("items", FieldKind::VariableCollection(ElementKind::String))
            .build()
            .unwrap();
        let record = Record::builder(&layout)
            .set("items", Value::List(vec![Value::I32(1)]))
            .unwrap()
            .build()
            .unwrap();
        let err = size_of(&empty_registry(), &CodecConfig::default(), &record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SchemaMismatch);
    }

    #[test]
    fn test_unregistered_variant_rejected() {
        let leaf = RecordLayout::builder("Leaf")
            .field("v", FieldKind::FixedPrimitive(PrimitiveType::U8))
            .build()
            .unwrap();
        let holder = RecordLayout::builder("Holder")
            .field("inner", FieldKind::Variant(DispatchTableId(1)))
            .build()
            .unwrap();
        let registry = SchemaRegistry::builder()
            .layout(Arc::clone(&holder))
            .table(
                DispatchTable::builder(DispatchTableId(1), "Inner")
                    .register(1, Arc::clone(&leaf))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let leaf_record = Record::builder(&leaf)
            .set("v", Value::U8(9))
            .unwrap()
            .build()
            .unwrap();
        let record = Record::builder(&holder)
            .set("inner", Value::Variant(VariantValue::new(7, leaf_record.clone())))
            .unwrap()
            .build()
            .unwrap();
        let err = size_of(&registry, &CodecConfig::default(), &record).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownVariantId);

        let record = Record::builder(&holder)
            .set("inner", Value::Variant(VariantValue::new(1, leaf_record)))
            .unwrap()
            .build()
            .unwrap();
        let mut out = BytesMut::new();
        let written = encode_record(&registry, &CodecConfig::default(), &record, &mut out).unwrap();
        assert_eq!(&out[..], &[0, 0, 0, 0, 0x01, 0x09]);
        assert_eq!(written, 6);
    }
}
