//! # Protocol Layer
//!
//! Everything above the raw record codec: variant dispatch tables, the schema
//! registry and its hash, the codec facade, and the version gate that guards it.
//!
//! ## Components
//! - **Dispatcher**: `type id -> layout` tables for polymorphic fields
//! - **Registry**: the frozen schema set and its protocol hash
//! - **Codec**: encode / decode / validate / size operations, dynamic or typed
//! - **Handshake**: the `Unverified -> Verified | Terminated` session gate
//!
//! ## Connection Flow
//! ```text
//! peer hash (32 bytes) -> Session::accept_handshake -> Session::codec -> records
//! ```

pub mod codec;
pub mod dispatcher;
pub mod handshake;
pub mod registry;
