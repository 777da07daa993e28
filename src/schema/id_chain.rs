//! Recursive parent chain of string ids, e.g. an asset inheriting from another.

use crate::core::layout::{FieldKind, RecordLayout};
use crate::core::value::{Record, Value};
use crate::error::Result;
use crate::protocol::codec::{expect_layout, WireRecord};
use crate::schema::{optional, required};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// `{ id: String, parent: Option<IdChain> }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdChain {
    id: String,
    parent: Option<Box<IdChain>>,
}

impl IdChain {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            parent: None,
        }
    }

    /// Same link with `parent` above it
    pub fn with_parent(mut self, parent: IdChain) -> Self {
        self.parent = Some(Box::new(parent));
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn parent(&self) -> Option<&IdChain> {
        self.parent.as_deref()
    }

    /// Number of links, this one included
    pub fn link_count(&self) -> usize {
        self.ancestors().count()
    }

    /// This link followed by every parent, nearest first
    pub fn ancestors(&self) -> impl Iterator<Item = &IdChain> {
        std::iter::successors(Some(self), |link| link.parent())
    }
}

impl WireRecord for IdChain {
    fn layout() -> Result<&'static Arc<RecordLayout>> {
        static LAYOUT: OnceCell<Arc<RecordLayout>> = OnceCell::new();
        LAYOUT.get_or_try_init(|| {
            RecordLayout::builder("IdChain")
                .field("id", FieldKind::VariableString)
                .optional("parent", FieldKind::RecursiveSelf)
                .build()
        })
    }

    fn to_record(&self) -> Result<Record> {
        let parent = self
            .parent
            .as_deref()
            .map(|p| p.to_record().map(Value::Record))
            .transpose()?;
        Record::builder(Self::layout()?)
            .set("id", Value::string(self.id.as_str()))?
            .set_opt("parent", parent)?
            .build()
    }

    fn from_record(record: &Record) -> Result<Self> {
        expect_layout(record, Self::layout()?)?;
        let parent = optional(record, "parent", Value::as_record)?
            .map(IdChain::from_record)
            .transpose()?;
        Ok(Self {
            id: required(record, "id", Value::as_str)?.to_string(),
            parent: parent.map(Box::new),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_links() {
        let chain = IdChain::new("sword_iron")
            .with_parent(IdChain::new("sword").with_parent(IdChain::new("weapon")));
        assert_eq!(chain.link_count(), 3);
        let ids: Vec<_> = chain.ancestors().map(IdChain::id).collect();
        assert_eq!(ids, vec!["sword_iron", "sword", "weapon"]);
    }

    #[test]
    fn test_record_conversion_keeps_absent_parent() {
        let chain = IdChain::new("root");
        let record = chain.to_record().unwrap();
        assert!(!record.is_present("parent"));
        assert_eq!(IdChain::from_record(&record).unwrap(), chain);
    }
}
