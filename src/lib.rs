//! # Game Wire Protocol
//!
//! Schema-driven binary codec for a real-time game protocol.
//!
//! Every record type is described by a [`RecordLayout`]: a null bitmask for its
//! nullable fields, a fixed block of primitives and offset slots, and a trailing
//! variable region. One generic codec encodes, decodes, validates and sizes any
//! layout, including recursive chains and trees and type-tagged variants.
//!
//! ## Modules
//! - [`core`]: layouts, values, and the record codec
//! - [`protocol`]: dispatch tables, schema registry, codec facade, version gate
//! - [`schema`]: concrete record definitions
//! - [`config`], [`error`], [`utils`]: configuration, errors, logging and metrics
//!
//! ## Quick Start
//! ```rust
//! use game_wire_protocol::config::CodecConfig;
//! use game_wire_protocol::protocol::handshake::{handshake_frame, Session};
//! use game_wire_protocol::schema::{self, IdChain};
//!
//! let registry = schema::registry().unwrap();
//! let mut session = Session::new(registry, CodecConfig::default());
//! session.accept_handshake(&handshake_frame(registry.protocol_hash())).unwrap();
//!
//! let codec = session.codec().unwrap();
//! let chain = IdChain::new("child").with_parent(IdChain::new("root"));
//! let bytes = codec.encode_value_to_vec(&chain).unwrap();
//!
//! assert!(codec.validate_value::<IdChain>(&bytes, 0).is_ok());
//! let (decoded, _) = session.decode_value::<IdChain>(&bytes, 0).unwrap();
//! assert_eq!(decoded, chain);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod schema;
pub mod utils;

pub use crate::core::layout::{
    DispatchTableId, ElementKind, EnumDescriptor, FieldKind, PrimitiveType, RecordLayout,
};
pub use crate::core::validator::ValidationResult;
pub use crate::core::value::{Record, RecordBuilder, Value, VariantValue};
pub use config::{CodecConfig, ProtocolConfig};
pub use error::{ErrorKind, ProtocolError, Result};
pub use protocol::codec::{Codec, WireRecord, WireVariant};
pub use protocol::dispatcher::DispatchTable;
pub use protocol::handshake::{handshake_frame, GateState, ProtocolHash, Session, SessionCodec};
pub use protocol::registry::SchemaRegistry;
