//! Variant dispatch tables.
//!
//! A dispatch table maps the VarInt type id at the front of a variant envelope
//! to the concrete record layout that follows it. Tables are built once at
//! startup and frozen; there is no default entry, so an unregistered id is
//! always an error and never decoded as some known shape.

use crate::core::layout::{DispatchTableId, RecordLayout};
use crate::error::{constants, ProtocolError, Result};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;

/// Frozen `type id -> layout` table for one polymorphic hierarchy
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchTable {
    id: DispatchTableId,
    name: Cow<'static, str>,
    entries: BTreeMap<u32, Arc<RecordLayout>>,
}

impl DispatchTable {
    pub fn builder(id: DispatchTableId, name: impl Into<Cow<'static, str>>) -> DispatchTableBuilder {
        DispatchTableBuilder {
            id,
            name: name.into(),
            entries: BTreeMap::new(),
            duplicate: None,
        }
    }

    pub fn id(&self) -> DispatchTableId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Layout registered for `type_id`
    #[inline]
    pub fn get(&self, type_id: u32) -> Option<&Arc<RecordLayout>> {
        self.entries.get(&type_id)
    }

    pub fn contains(&self, type_id: u32) -> bool {
        self.entries.contains_key(&type_id)
    }

    /// Registered type ids in ascending order
    pub fn type_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    /// Type id under which `layout` is registered
    pub fn type_id_of(&self, layout: &Arc<RecordLayout>) -> Option<u32> {
        self.entries
            .iter()
            .find(|(_, registered)| registered.same_as(layout))
            .map(|(type_id, _)| *type_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn layouts(&self) -> impl Iterator<Item = &Arc<RecordLayout>> {
        self.entries.values()
    }

    pub(crate) fn write_fingerprint(&self, out: &mut String) {
        let _ = write!(out, "table#{} {}{{", self.id, self.name);
        for (i, (type_id, layout)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            let _ = write!(out, "{type_id}=");
            out.push_str(&layout.fingerprint());
        }
        out.push('}');
    }
}

/// Startup-time registration of a [`DispatchTable`]
#[derive(Debug)]
pub struct DispatchTableBuilder {
    id: DispatchTableId,
    name: Cow<'static, str>,
    entries: BTreeMap<u32, Arc<RecordLayout>>,
    duplicate: Option<u32>,
}

impl DispatchTableBuilder {
    /// Register `layout` under `type_id`
    pub fn register(mut self, type_id: u32, layout: Arc<RecordLayout>) -> Self {
        if self.entries.insert(type_id, layout).is_some() && self.duplicate.is_none() {
            self.duplicate = Some(type_id);
        }
        self
    }

    pub fn build(self) -> Result<DispatchTable> {
        if let Some(type_id) = self.duplicate {
            return Err(ProtocolError::InvalidSchema(format!(
                "{} ({}): {} {type_id}",
                self.name,
                self.id,
                constants::ERR_DUPLICATE_TYPE_ID
            )));
        }
        Ok(DispatchTable {
            id: self.id,
            name: self.name,
            entries: self.entries,
        })
    }
}
