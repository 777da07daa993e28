//! Interaction parameter values: a variant hierarchy over four scalar shapes.

use crate::core::layout::{DispatchTableId, FieldKind, PrimitiveType, RecordLayout};
use crate::core::value::{Record, Value, VariantValue};
use crate::error::{ProtocolError, Result};
use crate::protocol::codec::{expect_layout, WireVariant};
use crate::protocol::dispatcher::DispatchTable;
use crate::schema::{required, PARAM_VALUE_TABLE};
use once_cell::sync::OnceCell;
use std::sync::Arc;

const STRING_ID: u32 = 1;
const INT_ID: u32 = 2;
const BOOL_ID: u32 = 3;
const DOUBLE_ID: u32 = 4;

/// A typed parameter, dispatched through [`PARAM_VALUE_TABLE`]
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Int(i32),
    Bool(bool),
    Double(f64),
}

struct Layouts {
    string: Arc<RecordLayout>,
    int: Arc<RecordLayout>,
    boolean: Arc<RecordLayout>,
    double: Arc<RecordLayout>,
}

fn layouts() -> Result<&'static Layouts> {
    static LAYOUTS: OnceCell<Layouts> = OnceCell::new();
    LAYOUTS.get_or_try_init(|| {
        let single = |name: &'static str, kind: FieldKind| {
            RecordLayout::builder(name).field("value", kind).build()
        };
        Ok(Layouts {
            string: single("StringParamValue", FieldKind::VariableString)?,
            int: single("IntParamValue", FieldKind::FixedPrimitive(PrimitiveType::I32))?,
            boolean: single("BoolParamValue", FieldKind::FixedPrimitive(PrimitiveType::Bool))?,
            double: single("DoubleParamValue", FieldKind::FixedPrimitive(PrimitiveType::F64))?,
        })
    })
}

/// Dispatch table registering every [`ParamValue`] shape
pub fn table() -> Result<DispatchTable> {
    let layouts = layouts()?;
    DispatchTable::builder(PARAM_VALUE_TABLE, "ParamValue")
        .register(STRING_ID, Arc::clone(&layouts.string))
        .register(INT_ID, Arc::clone(&layouts.int))
        .register(BOOL_ID, Arc::clone(&layouts.boolean))
        .register(DOUBLE_ID, Arc::clone(&layouts.double))
        .build()
}

impl ParamValue {
    /// Type id written in front of the payload
    pub fn type_id(&self) -> u32 {
        match self {
            ParamValue::String(_) => STRING_ID,
            ParamValue::Int(_) => INT_ID,
            ParamValue::Bool(_) => BOOL_ID,
            ParamValue::Double(_) => DOUBLE_ID,
        }
    }
}

impl WireVariant for ParamValue {
    const TABLE: DispatchTableId = PARAM_VALUE_TABLE;

    fn to_variant(&self) -> Result<VariantValue> {
        let layouts = layouts()?;
        let (layout, value) = match self {
            ParamValue::String(s) => (&layouts.string, Value::string(s.as_str())),
            ParamValue::Int(v) => (&layouts.int, Value::I32(*v)),
            ParamValue::Bool(v) => (&layouts.boolean, Value::Bool(*v)),
            ParamValue::Double(v) => (&layouts.double, Value::F64(*v)),
        };
        let record = Record::builder(layout).set("value", value)?.build()?;
        Ok(VariantValue::new(self.type_id(), record))
    }

    fn from_variant(variant: &VariantValue) -> Result<Self> {
        let layouts = layouts()?;
        let record = variant.record();
        match variant.type_id() {
            STRING_ID => {
                expect_layout(record, &layouts.string)?;
                Ok(ParamValue::String(
                    required(record, "value", Value::as_str)?.to_string(),
                ))
            }
            INT_ID => {
                expect_layout(record, &layouts.int)?;
                Ok(ParamValue::Int(required(record, "value", Value::as_i32)?))
            }
            BOOL_ID => {
                expect_layout(record, &layouts.boolean)?;
                Ok(ParamValue::Bool(required(record, "value", Value::as_bool)?))
            }
            DOUBLE_ID => {
                expect_layout(record, &layouts.double)?;
                Ok(ParamValue::Double(required(record, "value", Value::as_f64)?))
            }
            type_id => Err(ProtocolError::UnknownVariantId {
                table: PARAM_VALUE_TABLE.0,
                type_id,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_type_ids_are_stable() {
        assert_eq!(ParamValue::String("a".into()).type_id(), 1);
        assert_eq!(ParamValue::Int(0).type_id(), 2);
        assert_eq!(ParamValue::Bool(true).type_id(), 3);
        assert_eq!(ParamValue::Double(0.0).type_id(), 4);
        assert_eq!(table().unwrap().type_ids().collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_variant_conversion() {
        for param in [
            ParamValue::String("fire".into()),
            ParamValue::Int(-3),
            ParamValue::Bool(true),
            ParamValue::Double(2.5),
        ] {
            let variant = param.to_variant().unwrap();
            assert_eq!(ParamValue::from_variant(&variant).unwrap(), param);
        }
    }

    #[test]
    fn test_unknown_type_id() {
        let record = ParamValue::Int(1).to_variant().unwrap().record().clone();
        let err = ParamValue::from_variant(&VariantValue::new(9, record)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownVariantId);
    }
}
