//! Counters for sync and view derivation.
//!
//! Atomic, lock-free, readable as plain snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Remote operation counters.
#[derive(Default)]
pub struct SyncMetrics {
    /// Operations whose result was committed locally
    committed: AtomicU64,
    /// Operations that failed remotely or locally
    failed: AtomicU64,
    /// Submissions rejected because the target was pending
    rejected: AtomicU64,
    /// Sum of remote call latencies in microseconds
    remote_latency_us: AtomicU64,
    /// Number of remote calls measured
    remote_calls: AtomicU64,
}

/// Point-in-time copy of [`SyncMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStats {
    pub committed: u64,
    pub failed: u64,
    pub rejected: u64,
    pub remote_calls: u64,
    pub avg_remote_latency: Duration,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_remote_call(&self, latency: Duration) {
        self.remote_calls.fetch_add(1, Ordering::Relaxed);
        self.remote_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_committed(&self) {
        self.committed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Average remote call latency.
    pub fn avg_remote_latency(&self) -> Duration {
        let calls = self.remote_calls.load(Ordering::Relaxed);
        let latency_us = self.remote_latency_us.load(Ordering::Relaxed);
        if calls == 0 {
            Duration::ZERO
        } else {
            Duration::from_micros(latency_us / calls)
        }
    }

    pub fn snapshot(&self) -> SyncStats {
        SyncStats {
            committed: self.committed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            remote_calls: self.remote_calls.load(Ordering::Relaxed),
            avg_remote_latency: self.avg_remote_latency(),
        }
    }
}

/// View derivation counters.
#[derive(Default)]
pub struct DeriveMetrics {
    recomputations: AtomicU64,
    cancelled: AtomicU64,
    discarded: AtomicU64,
}

/// Point-in-time copy of [`DeriveMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeriveStats {
    /// Views derived and published
    pub recomputations: u64,
    /// Pending recomputations cancelled before firing
    pub cancelled: u64,
    /// Recomputations that fired after a newer change and were dropped
    pub discarded: u64,
}

impl DeriveMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_recomputation(&self) {
        self.recomputations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled(&self) {
        self.cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DeriveStats {
        DeriveStats {
            recomputations: self.recomputations.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_metrics_counts() {
        let metrics = SyncMetrics::new();
        metrics.record_committed();
        metrics.record_committed();
        metrics.record_failed();
        metrics.record_rejected();

        let stats = metrics.snapshot();
        assert_eq!(stats.committed, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.rejected, 1);
    }

    #[test]
    fn test_avg_remote_latency() {
        let metrics = SyncMetrics::new();
        assert_eq!(metrics.avg_remote_latency(), Duration::ZERO);

        metrics.record_remote_call(Duration::from_millis(10));
        metrics.record_remote_call(Duration::from_millis(30));
        assert_eq!(metrics.avg_remote_latency(), Duration::from_millis(20));
        assert_eq!(metrics.snapshot().remote_calls, 2);
    }

    #[test]
    fn test_derive_metrics_snapshot() {
        let metrics = DeriveMetrics::new();
        metrics.record_recomputation();
        metrics.record_cancelled();
        metrics.record_cancelled();

        assert_eq!(
            metrics.snapshot(),
            DeriveStats {
                recomputations: 1,
                cancelled: 2,
                discarded: 0,
            }
        );
    }
}
