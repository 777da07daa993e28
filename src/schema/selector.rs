//! Target selectors: how an interaction picks what it affects.

use crate::core::layout::{DispatchTableId, FieldKind, PrimitiveType, RecordLayout};
use crate::core::value::{Record, Value, VariantValue};
use crate::error::{ProtocolError, Result};
use crate::protocol::codec::{expect_layout, WireRecord, WireVariant};
use crate::protocol::dispatcher::DispatchTable;
use crate::schema::{optional, required, Vector3f, SELECTOR_TABLE};
use once_cell::sync::OnceCell;
use std::sync::Arc;

const AOE_CIRCLE_ID: u32 = 1;
const RAYCAST_ID: u32 = 2;

/// Selector variants, dispatched through [`SELECTOR_TABLE`]
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Everything within `range` of the user, shifted by `offset`
    AoeCircle { range: f32, offset: Vector3f },
    /// First hit along the view ray, optionally limited to blocks tagged `block_tag`
    Raycast {
        distance: f32,
        block_tag: Option<String>,
    },
}

struct Layouts {
    aoe_circle: Arc<RecordLayout>,
    raycast: Arc<RecordLayout>,
}

fn layouts() -> Result<&'static Layouts> {
    static LAYOUTS: OnceCell<Layouts> = OnceCell::new();
    LAYOUTS.get_or_try_init(|| {
        Ok(Layouts {
            aoe_circle: RecordLayout::builder("AoeCircleSelector")
                .field("range", FieldKind::FixedPrimitive(PrimitiveType::F32))
                .field(
                    "offset",
                    FieldKind::FixedEmbedded(Arc::clone(Vector3f::layout()?)),
                )
                .build()?,
            raycast: RecordLayout::builder("RaycastSelector")
                .field("distance", FieldKind::FixedPrimitive(PrimitiveType::F32))
                .optional("block_tag", FieldKind::VariableString)
                .build()?,
        })
    })
}

/// Dispatch table registering every [`Selector`] shape
pub fn table() -> Result<DispatchTable> {
    let layouts = layouts()?;
    DispatchTable::builder(SELECTOR_TABLE, "Selector")
        .register(AOE_CIRCLE_ID, Arc::clone(&layouts.aoe_circle))
        .register(RAYCAST_ID, Arc::clone(&layouts.raycast))
        .build()
}

impl Selector {
    pub fn type_id(&self) -> u32 {
        match self {
            Selector::AoeCircle { .. } => AOE_CIRCLE_ID,
            Selector::Raycast { .. } => RAYCAST_ID,
        }
    }
}

impl WireVariant for Selector {
    const TABLE: DispatchTableId = SELECTOR_TABLE;

    fn to_variant(&self) -> Result<VariantValue> {
        let layouts = layouts()?;
        let record = match self {
            Selector::AoeCircle { range, offset } => Record::builder(&layouts.aoe_circle)
                .set("range", Value::F32(*range))?
                .set("offset", Value::Record(offset.to_record()?))?
                .build()?,
            Selector::Raycast {
                distance,
                block_tag,
            } => Record::builder(&layouts.raycast)
                .set("distance", Value::F32(*distance))?
                .set_opt("block_tag", block_tag.as_deref().map(Value::string))?
                .build()?,
        };
        Ok(VariantValue::new(self.type_id(), record))
    }

    fn from_variant(variant: &VariantValue) -> Result<Self> {
        let layouts = layouts()?;
        let record = variant.record();
        match variant.type_id() {
            AOE_CIRCLE_ID => {
                expect_layout(record, &layouts.aoe_circle)?;
                Ok(Selector::AoeCircle {
                    range: required(record, "range", Value::as_f32)?,
                    offset: Vector3f::from_record(required(record, "offset", Value::as_record)?)?,
                })
            }
            RAYCAST_ID => {
                expect_layout(record, &layouts.raycast)?;
                Ok(Selector::Raycast {
                    distance: required(record, "distance", Value::as_f32)?,
                    block_tag: optional(record, "block_tag", Value::as_str)?.map(str::to_string),
                })
            }
            type_id => Err(ProtocolError::UnknownVariantId {
                table: SELECTOR_TABLE.0,
                type_id,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_aoe_circle_is_fixed_size() {
        let layouts = layouts().unwrap();
        // range(4) + embedded Vector3f(12)
        assert_eq!(layouts.aoe_circle.fixed_block_size(), 16);
        assert!(layouts.aoe_circle.is_fixed_size());
    }

    #[test]
    fn test_variant_conversion() {
        for selector in [
            Selector::AoeCircle {
                range: 4.0,
                offset: Vector3f::new(0.0, 1.0, 0.0),
            },
            Selector::Raycast {
                distance: 12.0,
                block_tag: Some("ore".into()),
            },
            Selector::Raycast {
                distance: 3.0,
                block_tag: None,
            },
        ] {
            let variant = selector.to_variant().unwrap();
            assert_eq!(Selector::from_variant(&variant).unwrap(), selector);
        }
    }
}
