//! # Core Codec Components
//!
//! Schema metadata, the value model, and the generic record codec every
//! concrete record type instantiates.
//!
//! This module provides the foundation for the protocol: layout computation,
//! encoding, decoding, structural validation and size arithmetic.
//!
//! ## Components
//! - **VarInt**: LEB128 lengths, counts and type ids; bounds-checked reads
//! - **Bitmask**: presence bits for nullable fields
//! - **Layout**: field descriptors and the derived fixed block layout
//! - **Value**: decoded records and the encode-side builder
//! - **Region**: offset slots and the variable region cursor
//! - **Encoder / Walker / Validator / Consumed**: the four operations over a layout
//!
//! ## Wire Format
//! ```text
//! [NullBitmask] [Fixed fields] [u32 offset slot per variable field] [Variable region]
//! ```
//!
//! ## Security
//! - Every read is bounds-checked against the input slice
//! - Length and count prefixes are capped before anything is reserved
//! - Recursion depth is bounded by `CodecConfig::max_depth`
//! - Offsets must follow the canonical layout, so validation is linear

pub mod bitmask;
pub mod consumed;
pub mod encoder;
pub mod layout;
pub(crate) mod region;
pub mod validator;
pub mod value;
pub mod varint;
pub mod walker;
