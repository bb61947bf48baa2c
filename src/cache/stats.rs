//! Cache Statistics Module
//!
//! Tracks how reads were served and how invalidations went.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

// == Cache Stats ==
/// Snapshot of query cache counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Reads served from the cache
    pub hits: u64,
    /// Reads that found nothing usable and executed the query
    pub misses: u64,
    /// Reads whose key could not be derived, executed without caching
    pub bypassed: u64,
    /// Cache calls that failed or timed out and were treated as a miss
    pub unavailable: u64,
    /// Results written to the cache
    pub populated: u64,
    /// Namespace invalidations that reached the backend
    pub invalidations: u64,
    /// Namespace invalidations that failed
    pub invalidation_failures: u64,
}

impl CacheStats {
    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no cached reads have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

// == Stats Recorder ==
/// Lock-free counters shared by concurrent readers and writers.
#[derive(Debug, Default)]
pub struct StatsRecorder {
    hits: AtomicU64,
    misses: AtomicU64,
    bypassed: AtomicU64,
    unavailable: AtomicU64,
    populated: AtomicU64,
    invalidations: AtomicU64,
    invalidation_failures: AtomicU64,
}

impl StatsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_bypass(&self) {
        self.bypassed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unavailable(&self) {
        self.unavailable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_populated(&self) {
        self.populated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_invalidation_failure(&self) {
        self.invalidation_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Reads all counters.
    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypassed: self.bypassed.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            populated: self.populated.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            invalidation_failures: self.invalidation_failures.load(Ordering::Relaxed),
        }
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = StatsRecorder::new().snapshot();
        assert_eq!(stats, CacheStats::default());
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::default().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let recorder = StatsRecorder::new();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_hit();
        recorder.record_miss();
        assert_eq!(recorder.snapshot().hit_rate(), 0.75);
    }

    #[test]
    fn test_bypass_does_not_affect_hit_rate() {
        let recorder = StatsRecorder::new();
        recorder.record_hit();
        recorder.record_bypass();
        let stats = recorder.snapshot();
        assert_eq!(stats.bypassed, 1);
        assert_eq!(stats.hit_rate(), 1.0);
    }

    #[test]
    fn test_invalidation_counters() {
        let recorder = StatsRecorder::new();
        recorder.record_invalidation();
        recorder.record_invalidation_failure();
        recorder.record_invalidation_failure();
        let stats = recorder.snapshot();
        assert_eq!(stats.invalidations, 1);
        assert_eq!(stats.invalidation_failures, 2);
    }
}
