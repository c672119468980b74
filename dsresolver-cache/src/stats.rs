//! Usage counters for the resolution cache.

use std::sync::atomic::{AtomicU64, Ordering};

use dsresolver_core::Timestamp;
use serde::{Deserialize, Serialize};

/// Statistics about resolver usage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverStats {
    /// Number of `resolve` calls.
    pub lookups: u64,
    /// Lookups that returned a descriptor.
    pub hits: u64,
    /// Lookups that ended in a not-found error.
    pub misses: u64,
    /// Snapshots built and published.
    pub refreshes: u64,
    /// Refresh attempts that failed at the catalog.
    pub refresh_failures: u64,
    /// Refresh attempts skipped because another caller already refreshed.
    pub skipped_refreshes: u64,
    /// Tenants in the current snapshot.
    pub tenant_count: usize,
    /// When the current snapshot was built.
    pub built_at: Option<Timestamp>,
}

impl ResolverStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct StatsRecorder {
    lookups: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    refreshes: AtomicU64,
    refresh_failures: AtomicU64,
    skipped_refreshes: AtomicU64,
}

impl StatsRecorder {
    pub(crate) fn record_lookup(&self, hit: bool) {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_refresh_failure(&self) {
        self.refresh_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_skipped_refresh(&self) {
        self.skipped_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, tenant_count: usize, built_at: Option<Timestamp>) -> ResolverStats {
        ResolverStats {
            lookups: self.lookups.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            refreshes: self.refreshes.load(Ordering::Relaxed),
            refresh_failures: self.refresh_failures.load(Ordering::Relaxed),
            skipped_refreshes: self.skipped_refreshes.load(Ordering::Relaxed),
            tenant_count,
            built_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = ResolverStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = ResolverStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn test_recorder_counts() {
        let recorder = StatsRecorder::default();
        recorder.record_lookup(true);
        recorder.record_lookup(false);
        recorder.record_lookup(true);
        recorder.record_refresh();
        recorder.record_refresh_failure();
        recorder.record_skipped_refresh();

        let stats = recorder.snapshot(3, None);
        assert_eq!(stats.lookups, 3);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.refreshes, 1);
        assert_eq!(stats.refresh_failures, 1);
        assert_eq!(stats.skipped_refreshes, 1);
        assert_eq!(stats.tenant_count, 3);
    }

    #[test]
    fn test_stats_serialize_for_export() {
        let stats = ResolverStats {
            lookups: 5,
            hits: 4,
            misses: 1,
            tenant_count: 2,
            ..Default::default()
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hits"], 4);
        assert_eq!(json["tenant_count"], 2);
        assert!(json["built_at"].is_null());

        let back: ResolverStats = serde_json::from_value(json).unwrap();
        assert_eq!(back, stats);
    }
}
