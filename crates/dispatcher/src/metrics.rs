//! Sink metrics for observability

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which output a write went to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    /// Per-channel local file
    Local,
    /// Per-channel network mirror
    Network,
    /// Shared same-time log
    Merged,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SinkKind::Local => "local",
            SinkKind::Network => "network",
            SinkKind::Merged => "merged",
        }
    }
}

impl fmt::Display for SinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metrics for a single sink
#[derive(Debug, Default)]
pub struct SinkMetrics {
    /// Total successful writes
    write_count: AtomicU64,
    /// Total write failures
    failure_count: AtomicU64,
}

impl SinkMetrics {
    /// Create new metrics instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Get total write count
    pub fn write_count(&self) -> u64 {
        self.write_count.load(Ordering::Relaxed)
    }

    /// Increment write count
    pub fn inc_write_count(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get failure count
    pub fn failure_count(&self) -> u64 {
        self.failure_count.load(Ordering::Relaxed)
    }

    /// Increment failure count
    pub fn inc_failure_count(&self) {
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one write outcome
    pub fn record(&self, success: bool) {
        if success {
            self.inc_write_count();
        } else {
            self.inc_failure_count();
        }
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            write_count: self.write_count(),
            failure_count: self.failure_count(),
        }
    }
}

/// Snapshot of sink metrics (for reporting)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub write_count: u64,
    pub failure_count: u64,
}

/// Write counters for both sinks of one channel
///
/// Shared between the registry (readers) and the dispatch loop (writer).
#[derive(Debug, Default)]
pub struct ChannelMetrics {
    pub local: SinkMetrics,
    pub network: SinkMetrics,
}

impl ChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> ChannelMetricsSnapshot {
        ChannelMetricsSnapshot {
            local: self.local.snapshot(),
            network: self.network.snapshot(),
        }
    }
}

/// Point-in-time copy of [`ChannelMetrics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelMetricsSnapshot {
    pub local: MetricsSnapshot,
    pub network: MetricsSnapshot,
}

impl ChannelMetricsSnapshot {
    /// Failures across both sinks
    pub fn total_failures(&self) -> u64 {
        self.local.failure_count + self.network.failure_count
    }
}
