//! Observability and Metrics
//!
//! Datagram counters for the sealed datagram listener.
//!
//! Uses atomic counters so any number of handler tasks can record
//! concurrently without locking. A rejected datagram is counted exactly
//! once, under the reason it was dropped for.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for datagram processing
#[derive(Debug)]
pub struct Metrics {
    /// Datagrams handed to the request handler
    pub datagrams_received: AtomicU64,
    /// Bytes handed to the request handler
    pub bytes_received: AtomicU64,
    /// Datagrams dropped for being shorter than a frame
    pub rejected_too_short: AtomicU64,
    /// Datagrams dropped for failing tag verification
    pub rejected_auth: AtomicU64,
    /// Datagrams that authenticated successfully
    pub authenticated: AtomicU64,
    /// Sealed replies produced
    pub replies_sent: AtomicU64,
    /// Bytes of sealed replies produced
    pub bytes_sent: AtomicU64,
    /// Authenticated datagrams whose processor returned no reply
    pub no_reply: AtomicU64,
    /// Replies that could not be sealed
    pub seal_failures: AtomicU64,
    /// Replies the transport failed to send
    pub send_failures: AtomicU64,
    /// Plaintexts forwarded to a destination
    pub forwarded: AtomicU64,
    /// Plaintexts that could not be forwarded
    pub forward_failures: AtomicU64,
    /// Errors returned by the transport receive call
    pub receive_errors: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            datagrams_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            rejected_too_short: AtomicU64::new(0),
            rejected_auth: AtomicU64::new(0),
            authenticated: AtomicU64::new(0),
            replies_sent: AtomicU64::new(0),
            bytes_sent: AtomicU64::new(0),
            no_reply: AtomicU64::new(0),
            seal_failures: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
            forwarded: AtomicU64::new(0),
            forward_failures: AtomicU64::new(0),
            receive_errors: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a datagram entering the handler
    pub fn datagram_received(&self, byte_count: u64) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a datagram too short to hold a frame
    pub fn rejected_too_short(&self) {
        self.rejected_too_short.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a datagram that failed authentication
    pub fn rejected_auth(&self) {
        self.rejected_auth.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a datagram that authenticated
    pub fn authenticated(&self) {
        self.authenticated.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a sealed reply
    pub fn reply_sent(&self, byte_count: u64) {
        self.replies_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(byte_count, Ordering::Relaxed);
    }

    /// Record a processed datagram without a reply
    pub fn no_reply(&self) {
        self.no_reply.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reply that could not be sealed
    pub fn seal_failure(&self) {
        self.seal_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a reply the transport failed to send
    pub fn send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a forwarded plaintext
    pub fn forwarded(&self) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed forward
    pub fn forward_failure(&self) {
        self.forward_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a receive error
    pub fn receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Total datagrams rejected for any reason
    pub fn rejections(&self) -> u64 {
        self.rejected_too_short.load(Ordering::Relaxed) + self.rejected_auth.load(Ordering::Relaxed)
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            rejected_too_short: self.rejected_too_short.load(Ordering::Relaxed),
            rejected_auth: self.rejected_auth.load(Ordering::Relaxed),
            authenticated: self.authenticated.load(Ordering::Relaxed),
            replies_sent: self.replies_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            no_reply: self.no_reply.load(Ordering::Relaxed),
            seal_failures: self.seal_failures.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            forwarded: self.forwarded.load(Ordering::Relaxed),
            forward_failures: self.forward_failures.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            datagrams_received = snapshot.datagrams_received,
            bytes_received = snapshot.bytes_received,
            rejected_too_short = snapshot.rejected_too_short,
            rejected_auth = snapshot.rejected_auth,
            authenticated = snapshot.authenticated,
            replies_sent = snapshot.replies_sent,
            bytes_sent = snapshot.bytes_sent,
            no_reply = snapshot.no_reply,
            seal_failures = snapshot.seal_failures,
            send_failures = snapshot.send_failures,
            forwarded = snapshot.forwarded,
            forward_failures = snapshot.forward_failures,
            receive_errors = snapshot.receive_errors,
            uptime_seconds = snapshot.uptime_seconds,
            "Datagram metrics snapshot"
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
    pub datagrams_received: u64,
    pub bytes_received: u64,
    pub rejected_too_short: u64,
    pub rejected_auth: u64,
    pub authenticated: u64,
    pub replies_sent: u64,
    pub bytes_sent: u64,
    pub no_reply: u64,
    pub seal_failures: u64,
    pub send_failures: u64,
    pub forwarded: u64,
    pub forward_failures: u64,
    pub receive_errors: u64,
    pub uptime_seconds: u64,
}

/// Process-wide metrics instance
static METRICS: once_cell::sync::Lazy<Arc<Metrics>> =
    once_cell::sync::Lazy::new(|| Arc::new(Metrics::new()));

/// Get the global metrics instance
pub fn global_metrics() -> Arc<Metrics> {
    Arc::clone(&METRICS)
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
