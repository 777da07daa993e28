//! Interaction definitions: the top-level record tying targets, selectors and
//! parameters together.

use crate::core::layout::{ElementKind, FieldKind, PrimitiveType, RecordLayout};
use crate::core::value::{Record, Value};
use crate::error::Result;
use crate::protocol::codec::{expect_layout, WireRecord, WireVariant};
use crate::schema::{optional, required, wrong_shape, ParamValue, Selector};
use once_cell::sync::OnceCell;
use std::collections::BTreeMap;
use std::sync::Arc;

crate::wire_enum! {
    /// Who an interaction applies to
    pub enum InteractionTarget {
        User = 0,
        Owner = 1,
        Target = 2,
    }
}

/// `{ name, target, cooldown?, selector?, params: [ParamValue], tags?: {String: String} }`
#[derive(Debug, Clone, PartialEq)]
pub struct InteractionConfig {
    name: String,
    target: InteractionTarget,
    cooldown: Option<f32>,
    selector: Option<Selector>,
    params: Vec<ParamValue>,
    tags: Option<BTreeMap<String, String>>,
}

impl InteractionConfig {
    pub fn new(name: impl Into<String>, target: InteractionTarget) -> Self {
        Self {
            name: name.into(),
            target,
            cooldown: None,
            selector: None,
            params: Vec::new(),
            tags: None,
        }
    }

    /// Cooldown in seconds
    pub fn with_cooldown(mut self, seconds: f32) -> Self {
        self.cooldown = Some(seconds);
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_param(mut self, param: ParamValue) -> Self {
        self.params.push(param);
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> InteractionTarget {
        self.target
    }

    pub fn cooldown(&self) -> Option<f32> {
        self.cooldown
    }

    pub fn selector(&self) -> Option<&Selector> {
        self.selector.as_ref()
    }

    pub fn params(&self) -> &[ParamValue] {
        &self.params
    }

    pub fn tags(&self) -> Option<&BTreeMap<String, String>> {
        self.tags.as_ref()
    }
}

impl WireRecord for InteractionConfig {
    fn layout() -> Result<&'static Arc<RecordLayout>> {
        static LAYOUT: OnceCell<Arc<RecordLayout>> = OnceCell::new();
        LAYOUT.get_or_try_init(|| {
            RecordLayout::builder("InteractionConfig")
                .field("name", FieldKind::VariableString)
                .field("target", FieldKind::FixedEnum(InteractionTarget::descriptor()))
                .optional("cooldown", FieldKind::FixedPrimitive(PrimitiveType::F32))
                .optional("selector", FieldKind::Variant(Selector::TABLE))
                .field(
                    "params",
                    FieldKind::VariableCollection(ElementKind::Variant(ParamValue::TABLE)),
                )
                .optional(
                    "tags",
                    FieldKind::VariableMap {
                        key: ElementKind::String,
                        value: ElementKind::String,
                    },
                )
                .build()
        })
    }

    fn to_record(&self) -> Result<Record> {
        let selector = self
            .selector
            .as_ref()
            .map(|s| s.to_variant().map(Value::Variant))
            .transpose()?;
        let params = self
            .params
            .iter()
            .map(|p| p.to_variant().map(Value::Variant))
            .collect::<Result<Vec<_>>>()?;
        let tags = self.tags.as_ref().map(|tags| {
            Value::Map(
                tags.iter()
                    .map(|(k, v)| (Value::string(k.as_str()), Value::string(v.as_str())))
                    .collect(),
            )
        });

        Record::builder(Self::layout()?)
            .set("name", Value::string(self.name.as_str()))?
            .set("target", Value::Enum(self.target.value()))?
            .set_opt("cooldown", self.cooldown.map(Value::F32))?
            .set_opt("selector", selector)?
            .set("params", Value::List(params))?
            .set_opt("tags", tags)?
            .build()
    }

    /// Fails with `SchemaMismatch` when the decoded tag map repeats a key
    fn from_record(record: &Record) -> Result<Self> {
        expect_layout(record, Self::layout()?)?;

        let target = InteractionTarget::try_from(required(record, "target", Value::as_enum)?)?;
        let selector = optional(record, "selector", Value::as_variant)?
            .map(Selector::from_variant)
            .transpose()?;
        let params = required(record, "params", Value::as_list)?
            .iter()
            .map(|item| match item.as_variant() {
                Some(variant) => ParamValue::from_variant(variant),
                None => Err(wrong_shape(record, "params")),
            })
            .collect::<Result<Vec<_>>>()?;
        let tags = optional(record, "tags", Value::as_map)?
            .map(|entries| collect_tags(record, entries))
            .transpose()?;

        Ok(Self {
            name: required(record, "name", Value::as_str)?.to_string(),
            target,
            cooldown: optional(record, "cooldown", Value::as_f32)?,
            selector,
            params,
            tags,
        })
    }
}

/// Entries in wire order; a repeated key keeps its last value
fn collect_tags(record: &Record, entries: &[(Value, Value)]) -> Result<BTreeMap<String, String>> {
    let mut tags = BTreeMap::new();
    for (key, value) in entries {
        let (Some(key), Some(value)) = (key.as_str(), value.as_str()) else {
            return Err(wrong_shape(record, "tags"));
        };
        tags.insert(key.to_string(), value.to_string());
    }
    Ok(tags)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_wire_enum_checked_conversion() {
        assert_eq!(InteractionTarget::try_from(2).unwrap(), InteractionTarget::Target);
        assert_eq!(InteractionTarget::Owner.value(), 1);
        let err = InteractionTarget::try_from(3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidEnumValue);
        assert_eq!(InteractionTarget::descriptor().variant_count(), 3);
    }

    #[test]
    fn test_record_conversion() {
        let config = InteractionConfig::new("smash", InteractionTarget::Target)
            .with_cooldown(1.5)
            .with_selector(Selector::Raycast {
                distance: 5.0,
                block_tag: None,
            })
            .with_param(ParamValue::Int(3))
            .with_param(ParamValue::String("stone".into()))
            .with_tag("sound", "crunch");

        let record = config.to_record().unwrap();
        assert_eq!(record.get("target"), Some(&Value::Enum(2)));
        assert_eq!(InteractionConfig::from_record(&record).unwrap(), config);
    }

    #[test]
    fn test_duplicate_tag_keys_keep_last_value() {
        let layout = InteractionConfig::layout().unwrap();
        let record = Record::builder(layout)
            .set("name", Value::string("x"))
            .unwrap()
            .set("target", Value::Enum(0))
            .unwrap()
            .set("params", Value::List(vec![]))
            .unwrap()
            .set(
                "tags",
                Value::Map(vec![
                    (Value::string("k"), Value::string("a")),
                    (Value::string("k"), Value::string("b")),
                ]),
            )
            .unwrap()
            .build()
            .unwrap();
        let config = InteractionConfig::from_record(&record).unwrap();
        let tags = config.tags().unwrap();
        assert_eq!(tags.len(), 1);
        assert_eq!(tags.get("k").map(String::as_str), Some("b"));
    }
}
