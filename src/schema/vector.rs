//! Three-component float vector, stored inline wherever it is embedded.

use crate::core::layout::{FieldKind, PrimitiveType, RecordLayout};
use crate::core::value::{Record, Value};
use crate::error::Result;
use crate::protocol::codec::{expect_layout, WireRecord};
use crate::schema::required;
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// `{ x, y, z: f32 }`, 12 bytes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3f {
    x: f32,
    y: f32,
    z: f32,
}

impl Vector3f {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }

    pub fn z(&self) -> f32 {
        self.z
    }
}

impl WireRecord for Vector3f {
    fn layout() -> Result<&'static Arc<RecordLayout>> {
        static LAYOUT: OnceCell<Arc<RecordLayout>> = OnceCell::new();
        LAYOUT.get_or_try_init(|| {
            let float = || FieldKind::FixedPrimitive(PrimitiveType::F32);
            RecordLayout::builder("Vector3f")
                .field("x", float())
                .field("y", float())
                .field("z", float())
                .build()
        })
    }

    fn to_record(&self) -> Result<Record> {
        Record::builder(Self::layout()?)
            .set("x", Value::F32(self.x))?
            .set("y", Value::F32(self.y))?
            .set("z", Value::F32(self.z))?
            .build()
    }

    fn from_record(record: &Record) -> Result<Self> {
        expect_layout(record, Self::layout()?)?;
        Ok(Self {
            x: required(record, "x", Value::as_f32)?,
            y: required(record, "y", Value::as_f32)?,
            z: required(record, "z", Value::as_f32)?,
        })
    }
}
