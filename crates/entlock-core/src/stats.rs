// Lock statistics shared by the locker facade and its backends
// Counters are plain atomics; the same events are mirrored to the metrics facade

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time view of lock activity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LockStats {
    pub total_acquisitions: u64,
    pub failed_acquisitions: u64,
    pub total_releases: u64,
    pub expired_locks: u64,
    pub rolled_back_locks: u64,
    /// Held keys; only known for the local engine
    pub active_locks: Option<u64>,
}

#[derive(Default)]
pub struct LockStatsCollector {
    total_acquisitions: AtomicU64,
    failed_acquisitions: AtomicU64,
    total_releases: AtomicU64,
    expired_locks: AtomicU64,
    rolled_back_locks: AtomicU64,
}

impl LockStatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_acquired(&self, count: u64) {
        self.total_acquisitions.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("entlock_lock_acquired_total").increment(count);
    }

    pub fn record_conflict(&self) {
        self.failed_acquisitions.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("entlock_lock_conflict_total").increment(1);
    }

    pub fn record_released(&self, count: u64) {
        self.total_releases.fetch_add(count, Ordering::Relaxed);
        metrics::counter!("entlock_lock_released_total").increment(count);
    }

    pub fn record_expired(&self) {
        self.expired_locks.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("entlock_lock_expired_total").increment(1);
    }

    pub fn record_rolled_back(&self, count: u64) {
        self.rolled_back_locks.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self, active_locks: Option<u64>) -> LockStats {
        LockStats {
            total_acquisitions: self.total_acquisitions.load(Ordering::Relaxed),
            failed_acquisitions: self.failed_acquisitions.load(Ordering::Relaxed),
            total_releases: self.total_releases.load(Ordering::Relaxed),
            expired_locks: self.expired_locks.load(Ordering::Relaxed),
            rolled_back_locks: self.rolled_back_locks.load(Ordering::Relaxed),
            active_locks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let stats = LockStatsCollector::new();
        stats.record_acquired(3);
        stats.record_conflict();
        stats.record_released(2);
        stats.record_expired();
        stats.record_rolled_back(2);

        let snapshot = stats.snapshot(Some(1));
        assert_eq!(snapshot.total_acquisitions, 3);
        assert_eq!(snapshot.failed_acquisitions, 1);
        assert_eq!(snapshot.total_releases, 2);
        assert_eq!(snapshot.expired_locks, 1);
        assert_eq!(snapshot.rolled_back_locks, 2);
        assert_eq!(snapshot.active_locks, Some(1));
    }
}
