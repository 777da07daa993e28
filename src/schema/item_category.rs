//! Recursive category tree used by inventory and crafting menus.

use crate::core::layout::{ElementKind, FieldKind, PrimitiveType, RecordLayout};
use crate::core::value::{Record, Value};
use crate::error::Result;
use crate::protocol::codec::{expect_layout, WireRecord};
use crate::schema::{optional, required, wrong_shape};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// `{ id, name?, icon?, order: i32, children?: [ItemCategory] }`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemCategory {
    id: String,
    name: Option<String>,
    icon: Option<String>,
    order: i32,
    children: Option<Vec<ItemCategory>>,
}

impl ItemCategory {
    pub fn new(id: impl Into<String>, order: i32) -> Self {
        Self {
            id: id.into(),
            name: None,
            icon: None,
            order,
            children: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Attach `children`; an empty list is kept distinct from no list
    pub fn with_children(mut self, children: Vec<ItemCategory>) -> Self {
        self.children = Some(children);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn icon(&self) -> Option<&str> {
        self.icon.as_deref()
    }

    pub fn order(&self) -> i32 {
        self.order
    }

    pub fn children(&self) -> Option<&[ItemCategory]> {
        self.children.as_deref()
    }

    /// Categories in this subtree, this one included
    pub fn subtree_len(&self) -> usize {
        1 + self
            .children()
            .unwrap_or_default()
            .iter()
            .map(ItemCategory::subtree_len)
            .sum::<usize>()
    }
}

impl WireRecord for ItemCategory {
    fn layout() -> Result<&'static Arc<RecordLayout>> {
        static LAYOUT: OnceCell<Arc<RecordLayout>> = OnceCell::new();
        LAYOUT.get_or_try_init(|| {
            RecordLayout::builder("ItemCategory")
                .field("id", FieldKind::VariableString)
                .optional("name", FieldKind::VariableString)
                .optional("icon", FieldKind::VariableString)
                .field("order", FieldKind::FixedPrimitive(PrimitiveType::I32))
                .optional(
                    "children",
                    FieldKind::VariableCollection(ElementKind::RecursiveSelf),
                )
                .build()
        })
    }

    fn to_record(&self) -> Result<Record> {
        let children = self
            .children
            .as_ref()
            .map(|children| {
                children
                    .iter()
                    .map(|child| child.to_record().map(Value::Record))
                    .collect::<Result<Vec<_>>>()
                    .map(Value::List)
            })
            .transpose()?;

        Record::builder(Self::layout()?)
            .set("id", Value::string(self.id.as_str()))?
            .set_opt("name", self.name.as_deref().map(Value::string))?
            .set_opt("icon", self.icon.as_deref().map(Value::string))?
            .set("order", Value::I32(self.order))?
            .set_opt("children", children)?
            .build()
    }

    fn from_record(record: &Record) -> Result<Self> {
        expect_layout(record, Self::layout()?)?;
        let children = optional(record, "children", Value::as_list)?
            .map(|items| {
                items
                    .iter()
                    .map(|item| match item.as_record() {
                        Some(child) => ItemCategory::from_record(child),
                        None => Err(wrong_shape(record, "children")),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(Self {
            id: required(record, "id", Value::as_str)?.to_string(),
            name: optional(record, "name", Value::as_str)?.map(str::to_string),
            icon: optional(record, "icon", Value::as_str)?.map(str::to_string),
            order: required(record, "order", Value::as_i32)?,
            children,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_places_order_before_slots() {
        let layout = ItemCategory::layout().unwrap();
        // bitmask(1) + order(4) + four slots
        assert_eq!(layout.fixed_block_size(), 21);
        assert_eq!(layout.placement(3).unwrap().position, 1);
    }

    #[test]
    fn test_tree_conversion() {
        let tree = ItemCategory::new("tools", 1)
            .with_name("Tools")
            .with_children(vec![
                ItemCategory::new("pickaxes", 0).with_icon("pick.png"),
                ItemCategory::new("empty", 2).with_children(vec![]),
            ]);
        assert_eq!(tree.subtree_len(), 3);

        let back = ItemCategory::from_record(&tree.to_record().unwrap()).unwrap();
        assert_eq!(back, tree);
        assert_eq!(back.children().unwrap()[1].children(), Some(&[][..]));
    }
}
