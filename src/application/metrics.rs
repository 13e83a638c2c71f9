//! Observability metrics for the session guard.
//!
//! Provides counters about gating behavior for monitoring and debugging.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Metrics tracking gating statistics.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same underlying counters.
#[derive(Debug, Clone)]
pub struct GuardMetrics {
    inner: Arc<GuardMetricsInner>,
}

#[derive(Debug)]
struct GuardMetricsInner {
    /// Validations that reported the action as allowed
    checks_allowed: AtomicU64,
    /// Validations that reported the action as denied
    checks_denied: AtomicU64,
    /// Successful consumptions
    consumptions: AtomicU64,
    /// Sessions removed by expiry
    sessions_expired: AtomicU64,
    /// Abuse detections that blocked a batch of sessions
    abuse_blocks: AtomicU64,
}

impl GuardMetrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(GuardMetricsInner {
                checks_allowed: AtomicU64::new(0),
                checks_denied: AtomicU64::new(0),
                consumptions: AtomicU64::new(0),
                sessions_expired: AtomicU64::new(0),
                abuse_blocks: AtomicU64::new(0),
            }),
        }
    }

    pub(crate) fn record_check_allowed(&self) {
        self.inner.checks_allowed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_check_denied(&self) {
        self.inner.checks_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_consumption(&self) {
        self.inner.consumptions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self, count: usize) {
        self.inner
            .sessions_expired
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_abuse_block(&self) {
        self.inner.abuse_blocks.fetch_add(1, Ordering::Relaxed);
    }

    /// Validations that reported the action as allowed.
    pub fn checks_allowed(&self) -> u64 {
        self.inner.checks_allowed.load(Ordering::Relaxed)
    }

    /// Validations that reported the action as denied.
    pub fn checks_denied(&self) -> u64 {
        self.inner.checks_denied.load(Ordering::Relaxed)
    }

    /// Successful consumptions.
    pub fn consumptions(&self) -> u64 {
        self.inner.consumptions.load(Ordering::Relaxed)
    }

    /// Sessions removed by expiry.
    pub fn sessions_expired(&self) -> u64 {
        self.inner.sessions_expired.load(Ordering::Relaxed)
    }

    /// Abuse detections that blocked a batch of sessions.
    pub fn abuse_blocks(&self) -> u64 {
        self.inner.abuse_blocks.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> GuardMetricsSnapshot {
        GuardMetricsSnapshot {
            checks_allowed: self.checks_allowed(),
            checks_denied: self.checks_denied(),
            consumptions: self.consumptions(),
            sessions_expired: self.sessions_expired(),
            abuse_blocks: self.abuse_blocks(),
        }
    }

    /// Reset all metrics to zero.
    ///
    /// Useful for testing or when starting a new monitoring period.
    pub fn reset(&self) {
        self.inner.checks_allowed.store(0, Ordering::Relaxed);
        self.inner.checks_denied.store(0, Ordering::Relaxed);
        self.inner.consumptions.store(0, Ordering::Relaxed);
        self.inner.sessions_expired.store(0, Ordering::Relaxed);
        self.inner.abuse_blocks.store(0, Ordering::Relaxed);
    }
}

impl Default for GuardMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of guard metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GuardMetricsSnapshot {
    /// Validations that reported the action as allowed
    pub checks_allowed: u64,
    /// Validations that reported the action as denied
    pub checks_denied: u64,
    /// Successful consumptions
    pub consumptions: u64,
    /// Sessions removed by expiry
    pub sessions_expired: u64,
    /// Abuse detections that blocked a batch of sessions
    pub abuse_blocks: u64,
}

impl GuardMetricsSnapshot {
    /// Total validations observed (allowed + denied).
    pub fn total_checks(&self) -> u64 {
        self.checks_allowed.saturating_add(self.checks_denied)
    }

    /// Ratio of denied validations to total (0.0 to 1.0).
    ///
    /// Returns 0.0 if no validations have been observed.
    pub fn denial_rate(&self) -> f64 {
        let total = self.total_checks();
        if total == 0 {
            0.0
        } else {
            self.checks_denied as f64 / total as f64
        }
    }
}
