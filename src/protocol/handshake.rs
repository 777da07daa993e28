//! Protocol version gate
//!
//! Before any record is exchanged, the peer sends the 32-byte hash of the
//! schema set it was built with. The receiving side compares it against its own
//! [`SchemaRegistry::protocol_hash`] and either opens the record codecs or
//! terminates the session.
//!
//! **Two-state gate**
//! A [`Session`] starts `Unverified` and moves exactly once, to `Verified` or
//! `Terminated`. Encoding and validation go through the [`SessionCodec`] handed
//! out by [`Session::codec`], which refuses in every state but `Verified`.
//! Records from the peer are read only by [`Session::decode`] and
//! [`Session::decode_value`]. A decode failure is connection-terminal: the
//! stream position cannot be resynchronized.

use crate::config::CodecConfig;
use crate::core::layout::RecordLayout;
use crate::core::validator::ValidationResult;
use crate::core::value::Record;
use crate::error::{ProtocolError, Result};
use crate::protocol::codec::{Codec, WireRecord};
use crate::protocol::registry::SchemaRegistry;
use crate::utils::metrics::Metrics;
use bytes::BytesMut;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Length of the handshake frame and of the protocol hash
pub const PROTOCOL_HASH_LEN: usize = 32;

/// SHA-256 of a schema set's canonical fingerprint
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProtocolHash([u8; PROTOCOL_HASH_LEN]);

impl ProtocolHash {
    pub const fn from_bytes(bytes: [u8; PROTOCOL_HASH_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; PROTOCOL_HASH_LEN] {
        &self.0
    }

    /// Lowercase hex form used in logs and mismatch errors
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ProtocolHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for ProtocolHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProtocolHash({self})")
    }
}

/// The frame a peer sends to declare its schema set
pub fn handshake_frame(hash: &ProtocolHash) -> [u8; PROTOCOL_HASH_LEN] {
    *hash.as_bytes()
}

/// State of the version gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Unverified,
    Verified,
    Terminated,
}

/// Per-connection version gate and the only route to the record codecs
#[derive(Debug)]
pub struct Session<'r> {
    registry: &'r SchemaRegistry,
    config: CodecConfig,
    state: GateState,
    metrics: Option<&'r Metrics>,
}

impl<'r> Session<'r> {
    pub fn new(registry: &'r SchemaRegistry, config: CodecConfig) -> Self {
        Self {
            registry,
            config: config.clamped(),
            state: GateState::Unverified,
            metrics: None,
        }
    }

    /// Count handshakes and codec activity in `metrics`
    pub fn with_metrics(mut self, metrics: &'r Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn is_verified(&self) -> bool {
        self.state == GateState::Verified
    }

    /// Check the peer's handshake frame.
    ///
    /// Reads exactly [`PROTOCOL_HASH_LEN`] bytes from the front of `frame` and
    /// returns how many were read. Anything after them is left for the caller.
    ///
    /// # Errors
    /// - `TruncatedInput` when fewer than 32 bytes are available (terminates)
    /// - `VersionMismatch` when the hashes differ (terminates)
    /// - `ConnectionClosed` when the gate is not `Unverified`
    #[instrument(skip(self, frame), fields(frame_len = frame.len()))]
    pub fn accept_handshake(&mut self, frame: &[u8]) -> Result<usize> {
        match self.state {
            GateState::Unverified => {}
            GateState::Terminated => return Err(ProtocolError::ConnectionClosed),
            GateState::Verified => {
                // A second handshake is a protocol violation.
                self.terminate();
                return Err(ProtocolError::ConnectionClosed);
            }
        }

        let Some(declared) = frame.get(..PROTOCOL_HASH_LEN) else {
            self.reject();
            debug!(available = frame.len(), "Handshake frame too short");
            return Err(ProtocolError::TruncatedInput {
                position: 0,
                needed: PROTOCOL_HASH_LEN,
                available: frame.len(),
            });
        };

        let expected = self.registry.protocol_hash();
        if declared != expected.as_bytes() {
            self.reject();
            let mut received = [0u8; PROTOCOL_HASH_LEN];
            received.copy_from_slice(declared);
            let received = ProtocolHash::from_bytes(received);
            warn!(
                expected = %expected,
                received = %received,
                "Protocol hash mismatch, terminating session"
            );
            return Err(ProtocolError::VersionMismatch {
                expected: expected.to_hex(),
                received: received.to_hex(),
            });
        }

        self.state = GateState::Verified;
        if let Some(metrics) = self.metrics {
            metrics.handshake_verified();
        }
        debug!(hash = %expected, "Protocol hash verified");
        Ok(PROTOCOL_HASH_LEN)
    }

    /// Encoding and validation for this connection.
    ///
    /// # Errors
    /// `HandshakeIncomplete` before verification, `ConnectionClosed` after termination.
    pub fn codec(&self) -> Result<SessionCodec<'r>> {
        self.open().map(|inner| SessionCodec { inner })
    }

    fn open(&self) -> Result<Codec<'r>> {
        match self.state {
            GateState::Verified => {
                let codec = Codec::new(self.registry, self.config);
                Ok(match self.metrics {
                    Some(metrics) => codec.with_metrics(metrics),
                    None => codec,
                })
            }
            GateState::Unverified => Err(ProtocolError::HandshakeIncomplete),
            GateState::Terminated => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// Decode a record from the peer; any failure terminates the session
    pub fn decode(
        &mut self,
        layout: &Arc<RecordLayout>,
        buf: &[u8],
        offset: usize,
    ) -> Result<(Record, usize)> {
        let result = self.open()?.decode(layout, buf, offset);
        if let Err(e) = &result {
            debug!(error = %e, "Decode failed, terminating session");
            self.terminate();
        }
        result
    }

    /// Typed variant of [`Session::decode`]
    pub fn decode_value<T: WireRecord>(&mut self, buf: &[u8], offset: usize) -> Result<(T, usize)> {
        let result = self.open()?.decode_value::<T>(buf, offset);
        if let Err(e) = &result {
            debug!(error = %e, "Decode failed, terminating session");
            self.terminate();
        }
        result
    }

    /// Close the gate for good
    pub fn terminate(&mut self) {
        self.state = GateState::Terminated;
    }

    fn reject(&mut self) {
        self.terminate();
        if let Some(metrics) = self.metrics {
            metrics.handshake_rejected();
        }
    }
}

/// Codec handle of a verified [`Session`].
///
/// Covers everything except reading records from the peer, which goes through
/// the session so that a failure closes it:
///
/// ```compile_fail
/// use game_wire_protocol::config::CodecConfig;
/// use game_wire_protocol::protocol::handshake::{handshake_frame, Session};
/// use game_wire_protocol::schema::{self, Hitbox};
///
/// let registry = schema::registry().unwrap();
/// let mut session = Session::new(registry, CodecConfig::default());
/// session.accept_handshake(&handshake_frame(registry.protocol_hash())).unwrap();
/// let _ = session.codec().unwrap().decode_value::<Hitbox>(&[0u8; 8], 0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SessionCodec<'r> {
    inner: Codec<'r>,
}

impl<'r> SessionCodec<'r> {
    pub fn registry(&self) -> &'r SchemaRegistry {
        self.inner.registry()
    }

    pub fn config(&self) -> &CodecConfig {
        self.inner.config()
    }

    pub fn encode(&self, record: &Record, out: &mut BytesMut) -> Result<usize> {
        self.inner.encode(record, out)
    }

    pub fn encode_to_vec(&self, record: &Record) -> Result<Vec<u8>> {
        self.inner.encode_to_vec(record)
    }

    pub fn encode_value<T: WireRecord>(&self, value: &T, out: &mut BytesMut) -> Result<usize> {
        self.inner.encode_value(value, out)
    }

    pub fn encode_value_to_vec<T: WireRecord>(&self, value: &T) -> Result<Vec<u8>> {
        self.inner.encode_value_to_vec(value)
    }

    pub fn size_of(&self, record: &Record) -> Result<usize> {
        self.inner.size_of(record)
    }

    pub fn size_of_value<T: WireRecord>(&self, value: &T) -> Result<usize> {
        self.inner.size_of_value(value)
    }

    /// Pre-flight check of an inbound buffer; never fails and never closes the session
    pub fn validate(&self, layout: &Arc<RecordLayout>, buf: &[u8], offset: usize) -> ValidationResult {
        self.inner.validate(layout, buf, offset)
    }

    pub fn validate_value<T: WireRecord>(&self, buf: &[u8], offset: usize) -> ValidationResult {
        self.inner.validate_value::<T>(buf, offset)
    }

    /// Size of a record this side encoded
    pub fn bytes_consumed_value<T: WireRecord>(&self, buf: &[u8], offset: usize) -> Result<usize> {
        self.inner.bytes_consumed_value::<T>(buf, offset)
    }
}
