//! # Structural Validator
//!
//! Pre-decode check for buffers from an untrusted peer. It runs the same walk
//! as decode with a sink that builds nothing, so it never allocates and costs
//! time linear in the encoded size. It never fails: the outcome is reported as
//! a [`ValidationResult`].

use crate::config::CodecConfig;
use crate::core::layout::{PrimitiveType, RecordLayout};
use crate::core::walker::{Sink, Walker};
use crate::error::ErrorKind;
use crate::protocol::registry::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Sink that discards everything
pub(crate) struct Inspect;

impl Sink for Inspect {
    type Value = ();
    type Record = ();
    type List = ();
    type Map = ();

    fn primitive(_: PrimitiveType, _: &[u8]) {}
    fn enumeration(_: u8) {}
    fn string(_: &str) {}
    fn new_record(_: &Arc<RecordLayout>) {}
    fn set_field(_: &mut (), _: usize, _: ()) {}
    fn record(_: ()) {}
    fn variant(_: u32, _: ()) {}
    fn new_list(_: usize) {}
    fn push(_: &mut (), _: ()) {}
    fn list(_: ()) {}
    fn new_map(_: usize) {}
    fn insert(_: &mut (), _: (), _: ()) {}
    fn map(_: ()) {}
}

/// Outcome of a structural check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    ok: bool,
    reason: Option<ErrorKind>,
    consumed_bytes: Option<usize>,
}

impl ValidationResult {
    pub fn valid(consumed_bytes: usize) -> Self {
        Self {
            ok: true,
            reason: None,
            consumed_bytes: Some(consumed_bytes),
        }
    }

    pub fn invalid(reason: ErrorKind) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            consumed_bytes: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.ok
    }

    /// Why the buffer was rejected
    pub fn reason(&self) -> Option<ErrorKind> {
        self.reason
    }

    /// Size of the record when the buffer is valid
    pub fn consumed_bytes(&self) -> Option<usize> {
        self.consumed_bytes
    }
}

/// Check the record of `layout` at `offset` without decoding it
pub fn validate_record(
    registry: &SchemaRegistry,
    config: &CodecConfig,
    layout: &Arc<RecordLayout>,
    buf: &[u8],
    offset: usize,
) -> ValidationResult {
    match Walker::new(buf, registry, config).record::<Inspect>(layout, offset, 0) {
        Ok(((), end)) => ValidationResult::valid(end - offset),
        Err(e) => {
            debug!(layout = layout.name(), offset, error = %e, "Validation rejected buffer");
            ValidationResult::invalid(e.kind())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::layout::{DispatchTableId, FieldKind};
    use crate::protocol::dispatcher::DispatchTable;

    fn chain() -> Arc<RecordLayout> {
        RecordLayout::builder("Chain")
            .field("id", FieldKind::VariableString)
            .optional("parent", FieldKind::RecursiveSelf)
            .build()
            .unwrap()
    }

    /// `levels` nested chain links, each with an empty id
    fn nested(levels: usize) -> Vec<u8> {
        let mut buf = Vec::new();
        for level in 0..levels {
            let has_parent = level + 1 < levels;
            buf.push(u8::from(has_parent));
            buf.extend_from_slice(&0u32.to_le_bytes());
            buf.extend_from_slice(&if has_parent { 1u32 } else { 0 }.to_le_bytes());
            buf.push(0);
        }
        buf
    }

    #[test]
    fn test_valid_chain_reports_size() {
        let registry = SchemaRegistry::builder().build().unwrap();
        let buf = nested(3);
        let result = validate_record(&registry, &CodecConfig::default(), &chain(), &buf, 0);
        assert!(result.is_ok());
        assert_eq!(result.consumed_bytes(), Some(30));
        assert_eq!(result.reason(), None);
    }

    #[test]
    fn test_depth_limit() {
        let registry = SchemaRegistry::builder().build().unwrap();
        let config = CodecConfig::default().with_max_depth(2);
        let buf = nested(4);
        let result = validate_record(&registry, &config, &chain(), &buf, 0);
        assert!(!result.is_ok());
        assert_eq!(result.reason(), Some(ErrorKind::DepthExceeded));
        assert_eq!(result.consumed_bytes(), None);
    }

    #[test]
    fn test_unknown_variant_not_ok() {
        let leaf = RecordLayout::builder("Leaf").build().unwrap();
        let holder = RecordLayout::builder("Holder")
            .field("v", FieldKind::Variant(DispatchTableId(1)))
            .build()
            .unwrap();
        let registry = SchemaRegistry::builder()
            .table(
                DispatchTable::builder(DispatchTableId(1), "T")
                    .register(1, leaf)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let ok = validate_record(&registry, &CodecConfig::default(), &holder, &[0, 0, 0, 0, 1], 0);
        assert!(ok.is_ok());
        let bad = validate_record(&registry, &CodecConfig::default(), &holder, &[0, 0, 0, 0, 7], 0);
        assert_eq!(bad.reason(), Some(ErrorKind::UnknownVariantId));
    }
}
