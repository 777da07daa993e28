//! Observability and Metrics
//!
//! Counters for codec and handshake activity. Collection is opt-in: a
//! [`Codec`](crate::protocol::codec::Codec) or
//! [`Session`](crate::protocol::handshake::Session) only counts when a
//! `Metrics` instance is attached to it.
//!
//! Uses atomic counters for thread-safe metrics collection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Metrics collector for codec operations
#[derive(Debug)]
pub struct Metrics {
    /// Records successfully encoded
    pub records_encoded: AtomicU64,
    /// Bytes written by successful encodes
    pub bytes_encoded: AtomicU64,
    /// Encodes rejected before writing
    pub encode_errors: AtomicU64,
    /// Records successfully decoded
    pub records_decoded: AtomicU64,
    /// Bytes consumed by successful decodes
    pub bytes_decoded: AtomicU64,
    /// Decodes that failed with a typed error
    pub decode_errors: AtomicU64,
    /// Buffers that passed validation
    pub validations_passed: AtomicU64,
    /// Buffers rejected by validation
    pub validations_failed: AtomicU64,
    /// Handshakes with a matching protocol hash
    pub handshakes_verified: AtomicU64,
    /// Handshakes that terminated the session
    pub handshakes_rejected: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            records_encoded: AtomicU64::new(0),
            bytes_encoded: AtomicU64::new(0),
            encode_errors: AtomicU64::new(0),
            records_decoded: AtomicU64::new(0),
            bytes_decoded: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            validations_passed: AtomicU64::new(0),
            validations_failed: AtomicU64::new(0),
            handshakes_verified: AtomicU64::new(0),
            handshakes_rejected: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a successful encode
    pub fn record_encoded(&self, byte_count: u64) {
        self.records_encoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a rejected encode
    pub fn encode_error(&self) {
        self.encode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful decode
    pub fn record_decoded(&self, byte_count: u64) {
        self.records_decoded.fetch_add(1, Ordering::Relaxed);
        self.bytes_decoded.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a failed decode
    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a validation outcome
    pub fn validation(&self, ok: bool) {
        if ok {
            self.validations_passed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.validations_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a verified handshake
    pub fn handshake_verified(&self) {
        self.handshakes_verified.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a rejected handshake
    pub fn handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_encoded: self.records_encoded.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
            encode_errors: self.encode_errors.load(Ordering::Relaxed),
            records_decoded: self.records_decoded.load(Ordering::Relaxed),
            bytes_decoded: self.bytes_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            validations_passed: self.validations_passed.load(Ordering::Relaxed),
            validations_failed: self.validations_failed.load(Ordering::Relaxed),
            handshakes_verified: self.handshakes_verified.load(Ordering::Relaxed),
            handshakes_rejected: self.handshakes_rejected.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            records_encoded = snapshot.records_encoded,
            bytes_encoded = snapshot.bytes_encoded,
            encode_errors = snapshot.encode_errors,
            records_decoded = snapshot.records_decoded,
            bytes_decoded = snapshot.bytes_decoded,
            decode_errors = snapshot.decode_errors,
            validations_passed = snapshot.validations_passed,
            validations_failed = snapshot.validations_failed,
            handshakes_verified = snapshot.handshakes_verified,
            handshakes_rejected = snapshot.handshakes_rejected,
            uptime_seconds = snapshot.uptime_seconds,
            "Codec metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_encoded: u64,
    pub bytes_encoded: u64,
    pub encode_errors: u64,
    pub records_decoded: u64,
    pub bytes_decoded: u64,
    pub decode_errors: u64,
    pub validations_passed: u64,
    pub validations_failed: u64,
    pub handshakes_verified: u64,
    pub handshakes_rejected: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}

/// Initialize metrics collection (call once at startup)
pub fn init_metrics() {
    let _ = global_metrics();
    info!("Metrics collection initialized");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = Metrics::new();
        metrics.record_encoded(10);
        metrics.record_encoded(5);
        metrics.validation(true);
        metrics.validation(false);
        metrics.handshake_rejected();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_encoded, 2);
        assert_eq!(snapshot.bytes_encoded, 15);
        assert_eq!(snapshot.validations_passed, 1);
        assert_eq!(snapshot.validations_failed, 1);
        assert_eq!(snapshot.handshakes_rejected, 1);
        assert_eq!(snapshot.handshakes_verified, 0);
    }

    #[test]
    fn test_global_instance_is_shared() {
        init_metrics();
        assert!(std::ptr::eq(global_metrics(), global_metrics()));
    }
}
