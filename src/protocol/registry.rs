//! # Schema Registry
//!
//! The frozen set of record layouts and dispatch tables one build speaks,
//! together with the protocol hash derived from it.
//!
//! The registry is assembled once at startup. `build()` checks that layout
//! names and table ids are unique and that every dispatch table a layout
//! refers to (directly or through embedded layouts and table entries) is
//! registered, so an encode or decode never meets a dangling table id.
//!
//! ## Protocol Hash
//! SHA-256 over a canonical text fingerprint: layouts sorted by name, then
//! tables sorted by id, each listing field names, kinds, nullability and
//! type ids in declaration order. Any wire-visible schema change changes it.

use crate::core::layout::{DispatchTableId, RecordLayout};
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::dispatcher::DispatchTable;
use crate::protocol::handshake::{ProtocolHash, PROTOCOL_HASH_LEN};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Immutable schema set plus its protocol hash
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    layouts: BTreeMap<String, Arc<RecordLayout>>,
    tables: BTreeMap<DispatchTableId, DispatchTable>,
    hash: ProtocolHash,
}

impl SchemaRegistry {
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Top-level layout registered under `name`
    pub fn layout(&self, name: &str) -> Option<&Arc<RecordLayout>> {
        self.layouts.get(name)
    }

    pub fn layouts(&self) -> impl Iterator<Item = &Arc<RecordLayout>> {
        self.layouts.values()
    }

    pub fn table(&self, id: DispatchTableId) -> Option<&DispatchTable> {
        self.tables.get(&id)
    }

    /// Concrete layout for `type_id` in `table`.
    ///
    /// # Errors
    /// `UnknownVariantId` when the table does not register `type_id`. A table
    /// id that is not registered at all reports the same error.
    #[inline]
    pub fn resolve_variant(&self, table: DispatchTableId, type_id: u32) -> Result<&Arc<RecordLayout>> {
        self.tables
            .get(&table)
            .and_then(|t| t.get(type_id))
            .ok_or(ProtocolError::UnknownVariantId {
                table: table.0,
                type_id,
            })
    }

    /// Hash exchanged during the handshake
    pub fn protocol_hash(&self) -> &ProtocolHash {
        &self.hash
    }

    /// Canonical fingerprint the protocol hash is computed from
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        for layout in self.layouts.values() {
            out.push_str("layout ");
            out.push_str(&layout.fingerprint());
            out.push('\n');
        }
        for table in self.tables.values() {
            table.write_fingerprint(&mut out);
            out.push('\n');
        }
        out
    }
}

/// Startup-time assembly of a [`SchemaRegistry`]
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    layouts: Vec<Arc<RecordLayout>>,
    tables: Vec<DispatchTable>,
}

impl SchemaRegistryBuilder {
    /// Register a top-level record layout
    pub fn layout(mut self, layout: Arc<RecordLayout>) -> Self {
        self.layouts.push(layout);
        self
    }

    /// Register a dispatch table
    pub fn table(mut self, table: DispatchTable) -> Self {
        self.tables.push(table);
        self
    }

    /// Freeze the schema set and compute its protocol hash
    pub fn build(self) -> Result<SchemaRegistry> {
        let mut layouts = BTreeMap::new();
        for layout in self.layouts {
            let name = layout.name().to_string();
            if layouts.insert(name.clone(), layout).is_some() {
                return Err(ProtocolError::InvalidSchema(format!(
                    "{name}: {}",
                    constants::ERR_DUPLICATE_LAYOUT
                )));
            }
        }

        let mut tables = BTreeMap::new();
        for table in self.tables {
            let id = table.id();
            if tables.insert(id, table).is_some() {
                return Err(ProtocolError::InvalidSchema(format!(
                    "{id}: {}",
                    constants::ERR_DUPLICATE_TABLE
                )));
            }
        }

        let referencing = layouts
            .values()
            .chain(tables.values().flat_map(DispatchTable::layouts));
        for layout in referencing {
            if let Some(missing) = layout
                .referenced_tables()
                .into_iter()
                .find(|id| !tables.contains_key(id))
            {
                return Err(ProtocolError::InvalidSchema(format!(
                    "{} -> table {missing}: {}",
                    layout.name(),
                    constants::ERR_UNKNOWN_TABLE
                )));
            }
        }

        let mut registry = SchemaRegistry {
            layouts,
            tables,
            hash: ProtocolHash::from_bytes([0u8; PROTOCOL_HASH_LEN]),
        };
        let digest = Sha256::digest(registry.fingerprint().as_bytes());
        let mut hash = [0u8; PROTOCOL_HASH_LEN];
        hash.copy_from_slice(&digest);
        registry.hash = ProtocolHash::from_bytes(hash);

        debug!(
            layouts = registry.layouts.len(),
            tables = registry.tables.len(),
            hash = %registry.hash,
            "Schema registry built"
        );
        Ok(registry)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::core::layout::{FieldKind, PrimitiveType};
    use crate::error::ErrorKind;

    fn leaf(name: &'static str) -> Arc<RecordLayout> {
        RecordLayout::builder(name)
            .field("v", FieldKind::FixedPrimitive(PrimitiveType::U8))
            .build()
            .unwrap()
    }

    fn holder() -> Arc<RecordLayout> {
        RecordLayout::builder("Holder")
            .optional("inner", FieldKind::Variant(DispatchTableId(3)))
            .build()
            .unwrap()
    }

    fn table() -> DispatchTable {
        DispatchTable::builder(DispatchTableId(3), "Inner")
            .register(1, leaf("One"))
            .build()
            .unwrap()
    }

    #[test]
    fn test_resolve_variant() {
        let registry = SchemaRegistry::builder()
            .layout(holder())
            .table(table())
            .build()
            .unwrap();

        assert_eq!(
            registry.resolve_variant(DispatchTableId(3), 1).unwrap().name(),
            "One"
        );
        let err = registry.resolve_variant(DispatchTableId(3), 7).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownVariantId);
        assert!(registry.layout("Holder").is_some());
    }

    #[test]
    fn test_dangling_table_reference_rejected() {
        let err = SchemaRegistry::builder()
            .layout(holder())
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
        assert!(err.to_string().contains("unregistered dispatch table"));
    }

    #[test]
    fn test_duplicate_layout_rejected() {
        let err = SchemaRegistry::builder()
            .layout(leaf("Same"))
            .layout(leaf("Same"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("Duplicate layout"));
    }

    #[test]
    fn test_hash_is_stable_and_schema_sensitive() {
        let a = SchemaRegistry::builder()
            .layout(holder())
            .table(table())
            .build()
            .unwrap();
        let b = SchemaRegistry::builder()
            .table(table())
            .layout(holder())
            .build()
            .unwrap();
        assert_eq!(a.protocol_hash(), b.protocol_hash());

        let changed = DispatchTable::builder(DispatchTableId(3), "Inner")
            .register(2, leaf("One"))
            .build()
            .unwrap();
        let c = SchemaRegistry::builder()
            .layout(holder())
            .table(changed)
            .build()
            .unwrap();
        assert_ne!(a.protocol_hash(), c.protocol_hash());
    }
}
