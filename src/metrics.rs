//! Vendor-agnostic metrics collection via a pluggable sink.
//!
//! The live backend reports watch connection failures and snapshot
//! replacements to a [`MetricsSink`] without tying the library to a specific
//! metrics backend (Prometheus, OpenTelemetry, CloudWatch, etc.).
//!
//! The sink is handed to the backend when it is built, so two backends in
//! the same process can report to different places.
//!
//! ## Usage
//!
//! ```ignore
//! use arnmap_core::metrics::{MetricsSink, WatchFailure};
//! use std::sync::atomic::{AtomicU64, Ordering};
//!
//! struct PrometheusSink {
//!     failures: prometheus::IntCounter,
//! }
//!
//! impl MetricsSink for PrometheusSink {
//!     fn on_watch_failure(&self, failure: &WatchFailure) {
//!         self.failures.inc();
//!     }
//! }
//! ```
//!
//! [`CounterSink`] is a ready-made atomic implementation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::table::TableCounts;

/// A failed attempt to open the watch on the mapping document, passed to
/// [`MetricsSink::on_watch_failure`].
#[derive(Debug, Clone, Serialize)]
pub struct WatchFailure {
    /// Document the watcher tried to watch.
    pub document_name: String,
    /// Display form of the source error.
    pub reason: String,
    /// Pause before the next attempt.
    pub retry_in: Duration,
}

/// Emitted after the live tables were replaced from a document event.
///
/// * `counts` - sizes of the new tables.
/// * `parse_errors` - number of records or fields rejected while parsing;
///   non-zero means the snapshot is partial.
/// * `replaced_at` - when the swap completed.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotStats {
    pub document_name: String,
    pub counts: TableCounts,
    pub parse_errors: usize,
    pub replaced_at: SystemTime,
}

/// Trait for consuming live-backend metrics.
///
/// Implementations must be thread-safe and should not block; they are
/// called from the watcher task.
pub trait MetricsSink: Send + Sync {
    /// Called every time opening the watch fails, before the backoff.
    fn on_watch_failure(&self, failure: &WatchFailure);

    /// Called after each snapshot replacement (optional).
    fn on_snapshot_replaced(&self, _stats: &SnapshotStats) {
        // Default: no-op
    }
}

/// No-op sink; metrics are silently dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSink;

impl MetricsSink for NoOpSink {
    fn on_watch_failure(&self, _failure: &WatchFailure) {}
}

/// Counts events with atomics.
#[derive(Debug, Default)]
pub struct CounterSink {
    watch_failures: AtomicU64,
    snapshots: AtomicU64,
    partial_snapshots: AtomicU64,
}

impl CounterSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn watch_failures(&self) -> u64 {
        self.watch_failures.load(Ordering::SeqCst)
    }

    pub fn snapshots(&self) -> u64 {
        self.snapshots.load(Ordering::SeqCst)
    }

    /// Snapshots built from a document with rejected records.
    pub fn partial_snapshots(&self) -> u64 {
        self.partial_snapshots.load(Ordering::SeqCst)
    }
}

impl MetricsSink for CounterSink {
    fn on_watch_failure(&self, _failure: &WatchFailure) {
        self.watch_failures.fetch_add(1, Ordering::SeqCst);
    }

    fn on_snapshot_replaced(&self, stats: &SnapshotStats) {
        self.snapshots.fetch_add(1, Ordering::SeqCst);
        if stats.parse_errors > 0 {
            self.partial_snapshots.fetch_add(1, Ordering::SeqCst);
        }
    }
}
