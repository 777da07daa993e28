//! # Record Layouts
//!
//! Compiled schema metadata for one record type: the ordered field descriptors
//! and everything derived from them (bitmask width, fixed block size, and the
//! byte position of every fixed field and offset slot).
//!
//! ## Fixed Block Layout
//! ```text
//! [NullBitmask(ceil(nullable/8))] [fixed fields, declaration order] [u32 offset slot per variable field]
//! ```
//! The variable region follows the fixed block directly.
//!
//! A layout is built once through [`RecordLayoutBuilder`], checked at
//! construction, and shared as `Arc<RecordLayout>` from then on.

use crate::core::bitmask::bitmask_width;
use crate::core::value::Value;
use crate::error::{constants, ProtocolError, Result};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt::{self, Write};
use std::sync::Arc;

/// Width of one offset slot in the fixed block
pub const OFFSET_SLOT_WIDTH: usize = 4;

/// Fixed-width little-endian primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl PrimitiveType {
    /// Encoded width in bytes
    pub const fn width(self) -> usize {
        match self {
            PrimitiveType::Bool | PrimitiveType::I8 | PrimitiveType::U8 => 1,
            PrimitiveType::I16 | PrimitiveType::U16 => 2,
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => 4,
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => 8,
        }
    }

    /// Schema name of the type
    pub const fn name(self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::I8 => "i8",
            PrimitiveType::U8 => "u8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::U16 => "u16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::U32 => "u32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::U64 => "u64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
        }
    }

    /// Whether `value` has this primitive type
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (PrimitiveType::Bool, Value::Bool(_))
                | (PrimitiveType::I8, Value::I8(_))
                | (PrimitiveType::U8, Value::U8(_))
                | (PrimitiveType::I16, Value::I16(_))
                | (PrimitiveType::U16, Value::U16(_))
                | (PrimitiveType::I32, Value::I32(_))
                | (PrimitiveType::U32, Value::U32(_))
                | (PrimitiveType::I64, Value::I64(_))
                | (PrimitiveType::U64, Value::U64(_))
                | (PrimitiveType::F32, Value::F32(_))
                | (PrimitiveType::F64, Value::F64(_))
        )
    }

    /// Decode from exactly `self.width()` little-endian bytes
    pub(crate) fn read(self, bytes: &[u8]) -> Value {
        fn arr<const N: usize>(bytes: &[u8]) -> [u8; N] {
            let mut out = [0u8; N];
            out.copy_from_slice(&bytes[..N]);
            out
        }
        match self {
            PrimitiveType::Bool => Value::Bool(bytes[0] != 0),
            PrimitiveType::I8 => Value::I8(bytes[0] as i8),
            PrimitiveType::U8 => Value::U8(bytes[0]),
            PrimitiveType::I16 => Value::I16(i16::from_le_bytes(arr(bytes))),
            PrimitiveType::U16 => Value::U16(u16::from_le_bytes(arr(bytes))),
            PrimitiveType::I32 => Value::I32(i32::from_le_bytes(arr(bytes))),
            PrimitiveType::U32 => Value::U32(u32::from_le_bytes(arr(bytes))),
            PrimitiveType::I64 => Value::I64(i64::from_le_bytes(arr(bytes))),
            PrimitiveType::U64 => Value::U64(u64::from_le_bytes(arr(bytes))),
            PrimitiveType::F32 => Value::F32(f32::from_le_bytes(arr(bytes))),
            PrimitiveType::F64 => Value::F64(f64::from_le_bytes(arr(bytes))),
        }
    }

    /// Write `value` little-endian into `out` (exactly `self.width()` bytes).
    ///
    /// Returns false if `value` is not of this type.
    pub(crate) fn write(self, value: &Value, out: &mut [u8]) -> bool {
        match (self, value) {
            (PrimitiveType::Bool, Value::Bool(v)) => out[0] = u8::from(*v),
            (PrimitiveType::I8, Value::I8(v)) => out[0] = *v as u8,
            (PrimitiveType::U8, Value::U8(v)) => out[0] = *v,
            (PrimitiveType::I16, Value::I16(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveType::U16, Value::U16(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveType::I32, Value::I32(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveType::U32, Value::U32(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveType::I64, Value::I64(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveType::U64, Value::U64(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveType::F32, Value::F32(v)) => out.copy_from_slice(&v.to_le_bytes()),
            (PrimitiveType::F64, Value::F64(v)) => out.copy_from_slice(&v.to_le_bytes()),
            _ => return false,
        }
        true
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A one-byte enum whose valid wire values are `0..variant_count`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumDescriptor {
    name: Cow<'static, str>,
    variant_count: u8,
}

impl EnumDescriptor {
    pub const fn new(name: &'static str, variant_count: u8) -> Self {
        Self {
            name: Cow::Borrowed(name),
            variant_count,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant_count(&self) -> u8 {
        self.variant_count
    }

    /// Whether `raw` names a declared variant
    #[inline]
    pub fn contains(&self, raw: u8) -> bool {
        raw < self.variant_count
    }
}

/// Identifier of a variant dispatch table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DispatchTableId(pub u16);

impl fmt::Display for DispatchTableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape of one self-describing value inside a collection or map
#[derive(Debug, Clone, PartialEq)]
pub enum ElementKind {
    Primitive(PrimitiveType),
    Enum(EnumDescriptor),
    /// VarInt length + UTF-8 bytes
    String,
    /// A complete nested record
    Embedded(Arc<RecordLayout>),
    /// A complete nested record of the enclosing layout
    RecursiveSelf,
    /// VarInt type id + record of the registered layout
    Variant(DispatchTableId),
}

impl ElementKind {
    pub(crate) fn shape(&self) -> Shape<'_> {
        match self {
            ElementKind::Primitive(ty) => Shape::Primitive(*ty),
            ElementKind::Enum(desc) => Shape::Enum(desc),
            ElementKind::String => Shape::String,
            ElementKind::Embedded(layout) => Shape::Record(layout),
            ElementKind::RecursiveSelf => Shape::RecursiveSelf,
            ElementKind::Variant(table) => Shape::Variant(*table),
        }
    }

    /// Smallest number of bytes one element can occupy
    pub(crate) fn min_wire_size(&self, enclosing: &RecordLayout) -> usize {
        match self {
            ElementKind::Primitive(ty) => ty.width(),
            ElementKind::Enum(_) | ElementKind::String | ElementKind::Variant(_) => 1,
            ElementKind::Embedded(layout) => layout.fixed_block_size(),
            ElementKind::RecursiveSelf => enclosing.fixed_block_size(),
        }
    }

    /// An embedded record with no fields occupies no bytes at all
    fn is_zero_width(&self) -> bool {
        matches!(self, ElementKind::Embedded(layout) if layout.fixed_block_size() == 0)
    }

    /// Exact element width when every element has the same size
    pub(crate) fn fixed_width(&self) -> Option<usize> {
        match self {
            ElementKind::Primitive(ty) => Some(ty.width()),
            ElementKind::Enum(_) => Some(1),
            ElementKind::Embedded(layout) if layout.is_fixed_size() => {
                Some(layout.fixed_block_size())
            }
            _ => None,
        }
    }

    fn write_fingerprint(&self, out: &mut String) {
        match self {
            ElementKind::Primitive(ty) => out.push_str(ty.name()),
            ElementKind::Enum(desc) => {
                let _ = write!(out, "enum {}/{}", desc.name(), desc.variant_count());
            }
            ElementKind::String => out.push_str("string"),
            ElementKind::Embedded(layout) => layout.write_fingerprint(out),
            ElementKind::RecursiveSelf => out.push_str("self"),
            ElementKind::Variant(table) => {
                let _ = write!(out, "variant#{table}");
            }
        }
    }
}

/// Wire kind of a record field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    FixedPrimitive(PrimitiveType),
    FixedEnum(EnumDescriptor),
    /// A fixed-size record stored inline in the fixed block
    FixedEmbedded(Arc<RecordLayout>),
    VariableString,
    VariableCollection(ElementKind),
    VariableMap {
        key: ElementKind,
        value: ElementKind,
    },
    VariableEmbedded(Arc<RecordLayout>),
    RecursiveSelf,
    Variant(DispatchTableId),
}

impl FieldKind {
    /// Whether the field lives in the fixed block rather than the variable region
    pub fn is_fixed(&self) -> bool {
        matches!(
            self,
            FieldKind::FixedPrimitive(_) | FieldKind::FixedEnum(_) | FieldKind::FixedEmbedded(_)
        )
    }

    /// Bytes the field reserves in the fixed block (data or offset slot)
    pub fn fixed_width(&self) -> usize {
        match self {
            FieldKind::FixedPrimitive(ty) => ty.width(),
            FieldKind::FixedEnum(_) => 1,
            FieldKind::FixedEmbedded(layout) => layout.fixed_block_size(),
            _ => OFFSET_SLOT_WIDTH,
        }
    }

    pub(crate) fn shape(&self) -> Shape<'_> {
        match self {
            FieldKind::FixedPrimitive(ty) => Shape::Primitive(*ty),
            FieldKind::FixedEnum(desc) => Shape::Enum(desc),
            FieldKind::FixedEmbedded(layout) | FieldKind::VariableEmbedded(layout) => {
                Shape::Record(layout)
            }
            FieldKind::VariableString => Shape::String,
            FieldKind::VariableCollection(element) => Shape::Collection(element),
            FieldKind::VariableMap { key, value } => Shape::Map(key, value),
            FieldKind::RecursiveSelf => Shape::RecursiveSelf,
            FieldKind::Variant(table) => Shape::Variant(*table),
        }
    }

    fn write_fingerprint(&self, out: &mut String) {
        match self {
            FieldKind::FixedPrimitive(ty) => out.push_str(ty.name()),
            FieldKind::FixedEnum(desc) => {
                let _ = write!(out, "enum {}/{}", desc.name(), desc.variant_count());
            }
            FieldKind::FixedEmbedded(layout) => {
                out.push_str("fixed ");
                layout.write_fingerprint(out);
            }
            FieldKind::VariableString => out.push_str("string"),
            FieldKind::VariableCollection(element) => {
                out.push('[');
                element.write_fingerprint(out);
                out.push(']');
            }
            FieldKind::VariableMap { key, value } => {
                out.push_str("map<");
                key.write_fingerprint(out);
                out.push(',');
                value.write_fingerprint(out);
                out.push('>');
            }
            FieldKind::VariableEmbedded(layout) => layout.write_fingerprint(out),
            FieldKind::RecursiveSelf => out.push_str("self"),
            FieldKind::Variant(table) => {
                let _ = write!(out, "variant#{table}");
            }
        }
    }

    fn referenced_tables(&self, out: &mut Vec<DispatchTableId>) {
        fn element(kind: &ElementKind, out: &mut Vec<DispatchTableId>) {
            match kind {
                ElementKind::Variant(table) => out.push(*table),
                ElementKind::Embedded(layout) => layout.collect_tables(out),
                _ => {}
            }
        }
        match self {
            FieldKind::Variant(table) => out.push(*table),
            FieldKind::FixedEmbedded(layout) | FieldKind::VariableEmbedded(layout) => {
                layout.collect_tables(out)
            }
            FieldKind::VariableCollection(kind) => element(kind, out),
            FieldKind::VariableMap { key, value } => {
                element(key, out);
                element(value, out);
            }
            _ => {}
        }
    }
}

/// Borrowed view of a value shape shared by field and element kinds.
///
/// The encoder, walker and size calculator all dispatch on this.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Shape<'a> {
    Primitive(PrimitiveType),
    Enum(&'a EnumDescriptor),
    String,
    Record(&'a Arc<RecordLayout>),
    RecursiveSelf,
    Variant(DispatchTableId),
    Collection(&'a ElementKind),
    Map(&'a ElementKind, &'a ElementKind),
}

/// One field of a record layout
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    name: Cow<'static, str>,
    kind: FieldKind,
    nullable: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<Cow<'static, str>>, kind: FieldKind, nullable: bool) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }
}

/// Where a field sits in the fixed block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldPlacement {
    /// Byte position of the data (fixed fields) or offset slot (variable fields)
    pub position: usize,
    /// Presence bit index for nullable fields
    pub null_bit: Option<usize>,
}

/// Compiled metadata for one record type
#[derive(Debug, Clone, PartialEq)]
pub struct RecordLayout {
    name: Cow<'static, str>,
    fields: Vec<FieldDescriptor>,
    placements: Vec<FieldPlacement>,
    fixed_fields: Vec<usize>,
    variable_fields: Vec<usize>,
    nullable_count: usize,
    bitmask_width: usize,
    fixed_block_size: usize,
    digest: [u8; 32],
}

impl RecordLayout {
    /// Start building a layout named `name`
    pub fn builder(name: impl Into<Cow<'static, str>>) -> RecordLayoutBuilder {
        RecordLayoutBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Index of the field called `name`
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    pub fn placement(&self, index: usize) -> Option<FieldPlacement> {
        self.placements.get(index).copied()
    }

    pub(crate) fn placements(&self) -> &[FieldPlacement] {
        &self.placements
    }

    /// Indices of the fields stored in the fixed block
    pub(crate) fn fixed_fields(&self) -> &[usize] {
        &self.fixed_fields
    }

    /// Indices of the fields stored in the variable region, in declaration order
    pub(crate) fn variable_fields(&self) -> &[usize] {
        &self.variable_fields
    }

    pub fn nullable_count(&self) -> usize {
        self.nullable_count
    }

    pub fn bitmask_width(&self) -> usize {
        self.bitmask_width
    }

    /// Size of the fixed block, identical for every instance of this type
    pub fn fixed_block_size(&self) -> usize {
        self.fixed_block_size
    }

    pub fn variable_field_count(&self) -> usize {
        self.variable_fields.len()
    }

    /// True when no field lives in the variable region
    pub fn is_fixed_size(&self) -> bool {
        self.variable_fields.is_empty()
    }

    /// Same layout, by pointer or by fingerprint digest
    pub fn same_as(self: &Arc<Self>, other: &Arc<Self>) -> bool {
        Arc::ptr_eq(self, other) || self.digest == other.digest
    }

    /// Canonical text description used for the protocol hash
    pub fn fingerprint(&self) -> String {
        let mut out = String::new();
        self.write_fingerprint(&mut out);
        out
    }

    fn write_fingerprint(&self, out: &mut String) {
        out.push_str(&self.name);
        out.push('{');
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(field.name());
            out.push(':');
            field.kind.write_fingerprint(out);
            if field.nullable {
                out.push('?');
            }
        }
        out.push('}');
    }

    /// Every dispatch table this layout (or anything it embeds) refers to
    pub fn referenced_tables(&self) -> Vec<DispatchTableId> {
        let mut out = Vec::new();
        self.collect_tables(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_tables(&self, out: &mut Vec<DispatchTableId>) {
        for field in &self.fields {
            field.kind.referenced_tables(out);
        }
    }
}

/// Encode-time construction of a [`RecordLayout`]
#[derive(Debug)]
pub struct RecordLayoutBuilder {
    name: Cow<'static, str>,
    fields: Vec<FieldDescriptor>,
}

impl RecordLayoutBuilder {
    /// Append a required field
    pub fn field(mut self, name: impl Into<Cow<'static, str>>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor::new(name, kind, false));
        self
    }

    /// Append a nullable field
    pub fn optional(mut self, name: impl Into<Cow<'static, str>>, kind: FieldKind) -> Self {
        self.fields.push(FieldDescriptor::new(name, kind, true));
        self
    }

    /// Check the descriptors and derive the fixed block layout
    pub fn build(self) -> Result<Arc<RecordLayout>> {
        if self.name.is_empty() {
            return Err(ProtocolError::InvalidSchema(
                constants::ERR_EMPTY_NAME.to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.is_empty() {
                return Err(ProtocolError::InvalidSchema(format!(
                    "{}: {}",
                    self.name,
                    constants::ERR_EMPTY_NAME
                )));
            }
            if !seen.insert(field.name()) {
                return Err(ProtocolError::InvalidSchema(format!(
                    "{}.{}: {}",
                    self.name,
                    field.name(),
                    constants::ERR_DUPLICATE_FIELD
                )));
            }
            check_field(&self.name, field)?;
        }

        let nullable_count = self.fields.iter().filter(|f| f.nullable).count();
        let bitmask_width = bitmask_width(nullable_count);

        let mut placements = Vec::with_capacity(self.fields.len());
        let mut fixed_fields = Vec::new();
        let mut variable_fields = Vec::new();
        let mut null_bit = 0;
        let mut cursor = bitmask_width;

        for (index, field) in self.fields.iter().enumerate() {
            let bit = if field.nullable {
                null_bit += 1;
                Some(null_bit - 1)
            } else {
                None
            };
            placements.push(FieldPlacement {
                position: 0,
                null_bit: bit,
            });
            if field.kind.is_fixed() {
                placements[index].position = cursor;
                cursor += field.kind.fixed_width();
                fixed_fields.push(index);
            } else {
                variable_fields.push(index);
            }
        }

        // Offset slots follow every fixed field.
        for &index in &variable_fields {
            placements[index].position = cursor;
            cursor += OFFSET_SLOT_WIDTH;
        }

        let mut layout = RecordLayout {
            name: self.name,
            fields: self.fields,
            placements,
            fixed_fields,
            variable_fields,
            nullable_count,
            bitmask_width,
            fixed_block_size: cursor,
            digest: [0; 32],
        };
        layout.digest = Sha256::digest(layout.fingerprint().as_bytes()).into();
        Ok(Arc::new(layout))
    }
}

fn check_field(layout: &str, field: &FieldDescriptor) -> Result<()> {
    let invalid = |reason: &str| -> Result<()> {
        Err(ProtocolError::InvalidSchema(format!(
            "{layout}.{}: {reason}",
            field.name()
        )))
    };

    match &field.kind {
        FieldKind::FixedEmbedded(inner) if !inner.is_fixed_size() => {
            invalid(constants::ERR_FIXED_EMBED_VARIABLE)
        }
        FieldKind::RecursiveSelf if !field.nullable => {
            invalid(constants::ERR_RECURSIVE_NOT_NULLABLE)
        }
        FieldKind::FixedEnum(desc) if desc.variant_count() == 0 => {
            invalid("enum must declare at least one variant")
        }
        // A count prefix over zero-width elements is not bounded by the input.
        FieldKind::VariableCollection(element) if element.is_zero_width() => {
            invalid(constants::ERR_ZERO_WIDTH_ELEMENT)
        }
        FieldKind::VariableMap { key, value } if key.is_zero_width() && value.is_zero_width() => {
            invalid(constants::ERR_ZERO_WIDTH_ELEMENT)
        }
        _ => Ok(()),
    }
}
