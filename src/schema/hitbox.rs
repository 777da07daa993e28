//! Axis-aligned bounding box: six floats, no bitmask, no variable region.

use crate::core::layout::{FieldKind, PrimitiveType, RecordLayout};
use crate::core::value::{Record, Value};
use crate::error::Result;
use crate::protocol::codec::{expect_layout, WireRecord};
use crate::schema::{required, Vector3f};
use once_cell::sync::OnceCell;
use std::sync::Arc;

const FIELDS: [&str; 6] = ["min_x", "min_y", "min_z", "max_x", "max_y", "max_z"];

/// Fixed-only record, 24 bytes on the wire
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Hitbox {
    min: Vector3f,
    max: Vector3f,
}

impl Hitbox {
    pub fn new(min_x: f32, min_y: f32, min_z: f32, max_x: f32, max_y: f32, max_z: f32) -> Self {
        Self {
            min: Vector3f::new(min_x, min_y, min_z),
            max: Vector3f::new(max_x, max_y, max_z),
        }
    }

    pub fn from_corners(min: Vector3f, max: Vector3f) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> Vector3f {
        self.min
    }

    pub fn max(&self) -> Vector3f {
        self.max
    }

    fn components(&self) -> [f32; 6] {
        [
            self.min.x(),
            self.min.y(),
            self.min.z(),
            self.max.x(),
            self.max.y(),
            self.max.z(),
        ]
    }
}

impl WireRecord for Hitbox {
    fn layout() -> Result<&'static Arc<RecordLayout>> {
        static LAYOUT: OnceCell<Arc<RecordLayout>> = OnceCell::new();
        LAYOUT.get_or_try_init(|| {
            FIELDS
                .iter()
                .fold(RecordLayout::builder("Hitbox"), |builder, name| {
                    builder.field(*name, FieldKind::FixedPrimitive(PrimitiveType::F32))
                })
                .build()
        })
    }

    fn to_record(&self) -> Result<Record> {
        let mut builder = Record::builder(Self::layout()?);
        for (name, value) in FIELDS.iter().zip(self.components()) {
            builder = builder.set(name, Value::F32(value))?;
        }
        builder.build()
    }

    fn from_record(record: &Record) -> Result<Self> {
        expect_layout(record, Self::layout()?)?;
        let mut c = [0f32; 6];
        for (slot, name) in c.iter_mut().zip(FIELDS) {
            *slot = required(record, name, Value::as_f32)?;
        }
        Ok(Self::new(c[0], c[1], c[2], c[3], c[4], c[5]))
    }
}
