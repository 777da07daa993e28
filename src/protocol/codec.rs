//! Codec facade
//!
//! [`Codec`] bundles a registry and the codec limits and exposes the five
//! record operations, either over dynamic [`Record`]s or over typed values
//! implementing [`WireRecord`].
//!
//! ```rust
//! use bytes::BytesMut;
//! use game_wire_protocol::config::CodecConfig;
//! use game_wire_protocol::protocol::codec::Codec;
//! use game_wire_protocol::schema::{self, Hitbox};
//!
//! let registry = schema::registry().unwrap();
//! let codec = Codec::new(registry, CodecConfig::default());
//!
//! let hitbox = Hitbox::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
//! let mut buf = BytesMut::new();
//! assert_eq!(codec.encode_value(&hitbox, &mut buf).unwrap(), 24);
//!
//! let (decoded, consumed) = codec.decode_value::<Hitbox>(&buf, 0).unwrap();
//! assert_eq!(decoded, hitbox);
//! assert_eq!(consumed, 24);
//! ```

use crate::config::CodecConfig;
use crate::core::consumed::bytes_consumed;
use crate::core::encoder::{encode_record, size_of};
use crate::core::layout::{DispatchTableId, RecordLayout};
use crate::core::validator::{validate_record, ValidationResult};
use crate::core::value::{Record, VariantValue};
use crate::core::walker::decode_record;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::registry::SchemaRegistry;
use crate::utils::metrics::Metrics;
use bytes::BytesMut;
use std::sync::Arc;
use tracing::trace;

/// A typed record with a static layout
pub trait WireRecord: Sized {
    /// Layout shared by every instance
    fn layout() -> Result<&'static Arc<RecordLayout>>;

    /// Convert to the dynamic form the encoder walks
    fn to_record(&self) -> Result<Record>;

    /// Convert from a decoded record of [`WireRecord::layout`]
    fn from_record(record: &Record) -> Result<Self>;
}

/// A typed sum type dispatched through one table
pub trait WireVariant: Sized {
    /// Table the variants are registered in
    const TABLE: DispatchTableId;

    fn to_variant(&self) -> Result<VariantValue>;

    fn from_variant(variant: &VariantValue) -> Result<Self>;
}

/// Check that `record` was built or decoded for `layout`
pub fn expect_layout(record: &Record, layout: &Arc<RecordLayout>) -> Result<()> {
    if record.layout().same_as(layout) {
        Ok(())
    } else {
        Err(ProtocolError::SchemaMismatch(format!(
            "{} != {}: {}",
            record.layout().name(),
            layout.name(),
            constants::ERR_WRONG_LAYOUT
        )))
    }
}

/// Record operations over one schema set and one set of limits
#[derive(Debug, Clone, Copy)]
pub struct Codec<'r> {
    registry: &'r SchemaRegistry,
    config: CodecConfig,
    metrics: Option<&'r Metrics>,
}

impl<'r> Codec<'r> {
    /// Limits above what the wire format or the stack can carry are clamped
    pub fn new(registry: &'r SchemaRegistry, config: CodecConfig) -> Self {
        Self {
            registry,
            config: config.clamped(),
            metrics: None,
        }
    }

    /// Count operations in `metrics`
    pub fn with_metrics(mut self, metrics: &'r Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &'r SchemaRegistry {
        self.registry
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Append `record` to `out`; `out` is unchanged on error
    pub fn encode(&self, record: &Record, out: &mut BytesMut) -> Result<usize> {
        let result = encode_record(self.registry, &self.config, record, out);
        trace!(layout = record.layout().name(), ok = result.is_ok(), "encode");
        if let Some(metrics) = self.metrics {
            match &result {
                Ok(written) => metrics.record_encoded(*written as u64),
                Err(_) => metrics.encode_error(),
            }
        }
        result
    }

    pub fn encode_to_vec(&self, record: &Record) -> Result<Vec<u8>> {
        let mut out = BytesMut::with_capacity(self.size_of(record)?);
        self.encode(record, &mut out)?;
        Ok(out.to_vec())
    }

    pub fn size_of(&self, record: &Record) -> Result<usize> {
        size_of(self.registry, &self.config, record)
    }

    /// Decode the record of `layout` at `offset`; returns it and the bytes consumed
    pub fn decode(
        &self,
        layout: &Arc<RecordLayout>,
        buf: &[u8],
        offset: usize,
    ) -> Result<(Record, usize)> {
        let result = decode_record(self.registry, &self.config, layout, buf, offset);
        trace!(layout = layout.name(), offset, ok = result.is_ok(), "decode");
        if let Some(metrics) = self.metrics {
            match &result {
                Ok((_, consumed)) => metrics.record_decoded(*consumed as u64),
                Err(_) => metrics.decode_error(),
            }
        }
        result
    }

    /// Structural pre-flight check; never fails
    pub fn validate(&self, layout: &Arc<RecordLayout>, buf: &[u8], offset: usize) -> ValidationResult {
        let result = validate_record(self.registry, &self.config, layout, buf, offset);
        if let Some(metrics) = self.metrics {
            metrics.validation(result.is_ok());
        }
        result
    }

    pub fn bytes_consumed(&self, layout: &Arc<RecordLayout>, buf: &[u8], offset: usize) -> Result<usize> {
        bytes_consumed(self.registry, &self.config, layout, buf, offset)
    }

    pub fn encode_value<T: WireRecord>(&self, value: &T, out: &mut BytesMut) -> Result<usize> {
        let record = value.to_record()?;
        expect_layout(&record, T::layout()?)?;
        self.encode(&record, out)
    }

    pub fn encode_value_to_vec<T: WireRecord>(&self, value: &T) -> Result<Vec<u8>> {
        let record = value.to_record()?;
        expect_layout(&record, T::layout()?)?;
        self.encode_to_vec(&record)
    }

    pub fn size_of_value<T: WireRecord>(&self, value: &T) -> Result<usize> {
        self.size_of(&value.to_record()?)
    }

    pub fn decode_value<T: WireRecord>(&self, buf: &[u8], offset: usize) -> Result<(T, usize)> {
        let (record, consumed) = self.decode(T::layout()?, buf, offset)?;
        Ok((T::from_record(&record)?, consumed))
    }

    pub fn validate_value<T: WireRecord>(&self, buf: &[u8], offset: usize) -> ValidationResult {
        match T::layout() {
            Ok(layout) => self.validate(layout, buf, offset),
            Err(e) => ValidationResult::invalid(e.kind()),
        }
    }

    pub fn bytes_consumed_value<T: WireRecord>(&self, buf: &[u8], offset: usize) -> Result<usize> {
        self.bytes_consumed(T::layout()?, buf, offset)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::layout::{FieldKind, PrimitiveType};
    use crate::core::value::Value;

    #[test]
    fn test_metrics_are_opt_in() {
        let registry = SchemaRegistry::builder().build().unwrap();
        let layout = RecordLayout::builder("Counter")
            .field("n", FieldKind::FixedPrimitive(PrimitiveType::U32))
            .build()
            .unwrap();
        let record = Record::builder(&layout)
            .set("n", Value::U32(5))
            .unwrap()
            .build()
            .unwrap();

        let metrics = Metrics::new();
        let codec = Codec::new(&registry, CodecConfig::default()).with_metrics(&metrics);
        let bytes = codec.encode_to_vec(&record).unwrap();
        assert_eq!(bytes, vec![5, 0, 0, 0]);

        assert!(codec.decode(&layout, &bytes, 0).is_ok());
        assert!(codec.decode(&layout, &bytes[..2], 0).is_err());
        assert!(!codec.validate(&layout, &bytes[..3], 0).is_ok());

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_encoded, 1);
        assert_eq!(snapshot.bytes_encoded, 4);
        assert_eq!(snapshot.records_decoded, 1);
        assert_eq!(snapshot.decode_errors, 1);
        assert_eq!(snapshot.validations_failed, 1);
    }

    #[test]
    fn test_oversized_limits_clamped() {
        use crate::config::{MAX_DEPTH_LIMIT, WIRE_LENGTH_CAPACITY};
        use crate::error::ErrorKind;

        let registry = SchemaRegistry::builder().build().unwrap();
        let config = CodecConfig {
            max_depth: usize::MAX,
            max_string_len: usize::MAX,
            max_collection_len: usize::MAX,
        };
        let codec = Codec::new(&registry, config);
        assert_eq!(codec.config().max_depth, MAX_DEPTH_LIMIT);
        assert_eq!(codec.config().max_string_len, WIRE_LENGTH_CAPACITY);
        assert_eq!(codec.config().max_collection_len, WIRE_LENGTH_CAPACITY);

        // `{ next?: self }`, one 5-byte block per link, nested past the limit
        let link = RecordLayout::builder("Link")
            .optional("next", FieldKind::RecursiveSelf)
            .build()
            .unwrap();
        let mut buf: Vec<u8> = [0x01, 0, 0, 0, 0].repeat(MAX_DEPTH_LIMIT + 100);
        buf.extend_from_slice(&[0x00, 0, 0, 0, 0]);

        let deep = std::thread::Builder::new()
            .stack_size(256 * 1024 * 1024)
            .spawn(move || {
                let codec = Codec::new(&registry, config);
                (
                    codec.validate(&link, &buf, 0).reason(),
                    codec.decode(&link, &buf, 0).map(|_| ()).map_err(|e| e.kind()),
                    codec.bytes_consumed(&link, &buf, 0).map_err(|e| e.kind()),
                )
            })
            .unwrap()
            .join()
            .unwrap();
        assert_eq!(deep.0, Some(ErrorKind::DepthExceeded));
        assert_eq!(deep.1, Err(ErrorKind::DepthExceeded));
        assert_eq!(deep.2, Err(ErrorKind::DepthExceeded));
    }

    #[test]
    fn test_layout_mismatch_reported() {
        let a = RecordLayout::builder("A").build().unwrap();
        let b = RecordLayout::builder("B").build().unwrap();
        let record = Record::builder(&a).build().unwrap();
        let err = expect_layout(&record, &b).unwrap_err();
        assert!(err.to_string().contains("different layout"));
    }
}
