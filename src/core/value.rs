//! Decoded values and the encode-side record builder.
//!
//! [`Record`] is immutable once built: decoding produces it directly, and
//! encode-side code assembles one through [`RecordBuilder`], which checks field
//! names and value shapes before anything reaches the wire.

use crate::core::layout::{RecordLayout, Shape};
use crate::error::{constants, ProtocolError, Result};
use std::sync::Arc;

/// A value of any field or element kind
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Raw discriminant of a wire enum
    Enum(u8),
    String(String),
    List(Vec<Value>),
    /// Map entries in wire order
    Map(Vec<(Value, Value)>),
    Record(Record),
    Variant(VariantValue),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Value::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Value::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::F64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<u8> {
        match self {
            Value::Enum(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[(Value, Value)]> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_variant(&self) -> Option<&VariantValue> {
        match self {
            Value::Variant(variant) => Some(variant),
            _ => None,
        }
    }

    /// Shallow check that the value has the right outer shape.
    ///
    /// Nested contents are checked by the encoder.
    pub(crate) fn fits(&self, shape: Shape<'_>, enclosing: &Arc<RecordLayout>) -> bool {
        match (shape, self) {
            (Shape::Primitive(ty), value) => ty.matches(value),
            (Shape::Enum(desc), Value::Enum(raw)) => desc.contains(*raw),
            (Shape::String, Value::String(_)) => true,
            (Shape::Record(layout), Value::Record(record)) => record.layout.same_as(layout),
            (Shape::RecursiveSelf, Value::Record(record)) => record.layout.same_as(enclosing),
            (Shape::Variant(_), Value::Variant(_)) => true,
            (Shape::Collection(_), Value::List(_)) => true,
            (Shape::Map(..), Value::Map(_)) => true,
            _ => false,
        }
    }
}

/// A record value: one optional value per field of its layout
#[derive(Debug, Clone)]
pub struct Record {
    layout: Arc<RecordLayout>,
    values: Vec<Option<Value>>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.layout.same_as(&other.layout) && self.values == other.values
    }
}

impl Record {
    /// Start building a record of `layout`
    pub fn builder(layout: &Arc<RecordLayout>) -> RecordBuilder {
        RecordBuilder {
            record: Record::empty(layout),
        }
    }

    /// A record with every field absent; filled in by the decoder
    pub(crate) fn empty(layout: &Arc<RecordLayout>) -> Self {
        Self {
            layout: Arc::clone(layout),
            values: vec![None; layout.field_count()],
        }
    }

    pub(crate) fn set_index(&mut self, index: usize, value: Value) {
        self.values[index] = Some(value);
    }

    pub fn layout(&self) -> &Arc<RecordLayout> {
        &self.layout
    }

    /// All field values in declaration order
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }

    /// Value of the field at `index`, if present
    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    /// Value of the field called `name`, if present
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.layout
            .field_index(name)
            .and_then(|index| self.get_index(index))
    }

    pub fn is_present(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Value of `name`, or a schema mismatch naming the missing field
    pub fn require(&self, name: &str) -> Result<&Value> {
        self.get(name).ok_or_else(|| {
            ProtocolError::SchemaMismatch(format!(
                "{}.{name}: {}",
                self.layout.name(),
                constants::ERR_MISSING_FIELD
            ))
        })
    }
}

/// A variant value: the registered type id and the concrete record
#[derive(Debug, Clone, PartialEq)]
pub struct VariantValue {
    type_id: u32,
    record: Record,
}

impl VariantValue {
    pub fn new(type_id: u32, record: Record) -> Self {
        Self { type_id, record }
    }

    pub fn type_id(&self) -> u32 {
        self.type_id
    }

    pub fn record(&self) -> &Record {
        &self.record
    }
}

/// Encode-side mutable construction of a [`Record`]
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    record: Record,
}

impl RecordBuilder {
    /// Set field `name` to `value`
    pub fn set(mut self, name: &str, value: Value) -> Result<Self> {
        let layout = Arc::clone(&self.record.layout);
        let index = layout.field_index(name).ok_or_else(|| {
            ProtocolError::SchemaMismatch(format!(
                "{}.{name}: {}",
                layout.name(),
                constants::ERR_UNKNOWN_FIELD
            ))
        })?;

        let field = &layout.fields()[index];
        if !value.fits(field.kind().shape(), &layout) {
            return Err(ProtocolError::SchemaMismatch(format!(
                "{}.{name}: {}",
                layout.name(),
                constants::ERR_WRONG_SHAPE
            )));
        }

        self.record.values[index] = Some(value);
        Ok(self)
    }

    /// Set field `name` when `value` is `Some`, leave it absent otherwise
    pub fn set_opt(self, name: &str, value: Option<Value>) -> Result<Self> {
        match value {
            Some(value) => self.set(name, value),
            None => Ok(self),
        }
    }

    /// Finish the record; every non-nullable field must be set
    pub fn build(self) -> Result<Record> {
        let layout = &self.record.layout;
        for (field, value) in layout.fields().iter().zip(&self.record.values) {
            if value.is_none() && !field.is_nullable() {
                return Err(ProtocolError::SchemaMismatch(format!(
                    "{}.{}: {}",
                    layout.name(),
                    field.name(),
                    constants::ERR_MISSING_FIELD
                )));
            }
        }
        Ok(self.record)
    }
}
