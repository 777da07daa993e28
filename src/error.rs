//! # Error Types
//!
//! Error handling for the wire codec and the protocol version gate.
//!
//! ## Error Categories
//! - **Structural Errors**: truncated input, bad offsets, inconsistent bitmasks,
//!   malformed VarInts, invalid UTF-8, out-of-range enum values
//! - **Dispatch Errors**: unknown variant type ids, recursion depth violations
//! - **Encode Errors**: capacity violations, values that do not match their layout
//! - **Handshake Errors**: protocol hash mismatch, codec use before verification
//! - **Startup Errors**: invalid schema definitions, configuration problems
//!
//! Every structural variant carries only `Copy` data. The validator builds these
//! errors on its hot path, and it must not allocate.
//!
//! ## Example Usage
//! ```rust
//! use game_wire_protocol::error::{ErrorKind, ProtocolError};
//!
//! let err = ProtocolError::TruncatedInput { position: 4, needed: 8, available: 2 };
//! assert_eq!(err.kind(), ErrorKind::TruncatedInput);
//! assert!(err.is_structural());
//! ```

use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Error message constants to reduce allocations in error paths.
pub mod constants {
    /// Schema construction errors
    pub const ERR_DUPLICATE_FIELD: &str = "Duplicate field name";
    pub const ERR_EMPTY_NAME: &str = "Layout and field names cannot be empty";
    pub const ERR_FIXED_EMBED_VARIABLE: &str =
        "Fixed embedded layout must not contain variable fields";
    pub const ERR_RECURSIVE_NOT_NULLABLE: &str =
        "Recursive single-link field must be nullable";
    pub const ERR_DUPLICATE_TYPE_ID: &str = "Duplicate variant type id";
    pub const ERR_DUPLICATE_TABLE: &str = "Duplicate dispatch table id";
    pub const ERR_DUPLICATE_LAYOUT: &str = "Duplicate layout name";
    pub const ERR_UNKNOWN_TABLE: &str = "Layout references an unregistered dispatch table";
    pub const ERR_ZERO_WIDTH_ELEMENT: &str =
        "Collection and map elements must occupy at least one byte";

    /// Encode-side mismatches
    pub const ERR_UNKNOWN_FIELD: &str = "Unknown field";
    pub const ERR_MISSING_FIELD: &str = "Missing value for non-nullable field";
    pub const ERR_WRONG_SHAPE: &str = "Value does not match field kind";
    pub const ERR_WRONG_LAYOUT: &str = "Record belongs to a different layout";
    pub const ERR_VARIANT_LAYOUT: &str = "Variant record does not match its registered layout";

    /// Handshake errors
    pub const ERR_HANDSHAKE_INCOMPLETE: &str = "Protocol hash not verified yet";
    pub const ERR_CONNECTION_CLOSED: &str = "Connection closed";
}

/// Allocation-free discriminant of a [`ProtocolError`].
///
/// This is what a [`ValidationResult`](crate::core::validator::ValidationResult)
/// reports as its reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Io,
    TruncatedInput,
    InvalidOffset,
    BitmaskInconsistent,
    UnknownVariantId,
    DepthExceeded,
    LengthExceedsCapacity,
    MalformedVarInt,
    InvalidUtf8,
    InvalidEnumValue,
    SchemaMismatch,
    VersionMismatch,
    HandshakeIncomplete,
    ConnectionClosed,
    InvalidSchema,
    Config,
}

// ProtocolError is the primary error type for all protocol operations
#[derive(Error, Debug, Serialize, Deserialize)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    #[serde(skip_serializing, skip_deserializing)]
    Io(#[from] io::Error),

    #[error("Truncated input: {needed} bytes needed at position {position}, {available} available")]
    TruncatedInput {
        position: usize,
        needed: usize,
        available: usize,
    },

    #[error("Invalid offset {offset} in slot at position {position} (expected {expected})")]
    InvalidOffset {
        position: usize,
        offset: usize,
        expected: usize,
    },

    #[error("Null bitmask byte {byte:#04x} at position {position} has unused bits set")]
    BitmaskInconsistent { position: usize, byte: u8 },

    #[error("Unknown variant type id {type_id} in dispatch table {table}")]
    UnknownVariantId { table: u16, type_id: u32 },

    #[error("Recursion depth {depth} exceeds maximum of {max_depth}")]
    DepthExceeded { depth: usize, max_depth: usize },

    #[error("Length {length} exceeds capacity of {capacity}")]
    LengthExceedsCapacity { length: usize, capacity: usize },

    #[error("Malformed VarInt at position {position}")]
    MalformedVarInt { position: usize },

    #[error("Invalid UTF-8 string at position {position}")]
    InvalidUtf8 { position: usize },

    #[error("Enum value {value} at position {position} is out of range (variants: {variant_count})")]
    InvalidEnumValue {
        position: usize,
        value: u8,
        variant_count: u8,
    },

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Protocol version mismatch: expected {expected}, received {received}")]
    VersionMismatch { expected: String, received: String },

    #[error("Protocol hash not verified yet")]
    HandshakeIncomplete,

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ProtocolError {
    /// The allocation-free discriminant of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProtocolError::Io(_) => ErrorKind::Io,
            ProtocolError::TruncatedInput { .. } => ErrorKind::TruncatedInput,
            ProtocolError::InvalidOffset { .. } => ErrorKind::InvalidOffset,
            ProtocolError::BitmaskInconsistent { .. } => ErrorKind::BitmaskInconsistent,
            ProtocolError::UnknownVariantId { .. } => ErrorKind::UnknownVariantId,
            ProtocolError::DepthExceeded { .. } => ErrorKind::DepthExceeded,
            ProtocolError::LengthExceedsCapacity { .. } => ErrorKind::LengthExceedsCapacity,
            ProtocolError::MalformedVarInt { .. } => ErrorKind::MalformedVarInt,
            ProtocolError::InvalidUtf8 { .. } => ErrorKind::InvalidUtf8,
            ProtocolError::InvalidEnumValue { .. } => ErrorKind::InvalidEnumValue,
            ProtocolError::SchemaMismatch(_) => ErrorKind::SchemaMismatch,
            ProtocolError::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            ProtocolError::HandshakeIncomplete => ErrorKind::HandshakeIncomplete,
            ProtocolError::ConnectionClosed => ErrorKind::ConnectionClosed,
            ProtocolError::InvalidSchema(_) => ErrorKind::InvalidSchema,
            ProtocolError::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// True for errors raised while reading untrusted bytes.
    ///
    /// A peer that produced one of these cannot be resynchronized.
    pub fn is_structural(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::TruncatedInput
                | ErrorKind::InvalidOffset
                | ErrorKind::BitmaskInconsistent
                | ErrorKind::UnknownVariantId
                | ErrorKind::DepthExceeded
                | ErrorKind::LengthExceedsCapacity
                | ErrorKind::MalformedVarInt
                | ErrorKind::InvalidUtf8
                | ErrorKind::InvalidEnumValue
        )
    }
}

/// Type alias for Results using ProtocolError
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_matches_variant() {
        let err = ProtocolError::UnknownVariantId {
            table: 3,
            type_id: 7,
        };
        assert_eq!(err.kind(), ErrorKind::UnknownVariantId);
        assert!(err.is_structural());
        assert!(err.to_string().contains("type id 7"));
    }

    #[test]
    fn test_handshake_errors_are_not_structural() {
        assert!(!ProtocolError::HandshakeIncomplete.is_structural());
        assert!(!ProtocolError::VersionMismatch {
            expected: "aa".into(),
            received: "bb".into(),
        }
        .is_structural());
        assert!(!ProtocolError::SchemaMismatch("x".into()).is_structural());
    }
}
