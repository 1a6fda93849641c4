use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Point-in-time cache layer statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Reads served from the store because the cache backend failed.
    pub bypasses: u64,
    /// Misses that waited for another caller's in-flight load.
    pub coalesced: u64,
    /// Keys removed by invalidation.
    pub purged: u64,
}

impl CacheStats {
    /// Hits over all cache lookups (0.0 before the first lookup).
    pub fn hit_rate(&self) -> f64 {
        let lookups = self.hits + self.misses;
        if lookups == 0 {
            0.0
        } else {
            self.hits as f64 / lookups as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hits={} misses={} hit_rate={:.1}% bypasses={} coalesced={} purged={}",
            self.hits,
            self.misses,
            self.hit_rate() * 100.0,
            self.bypasses,
            self.coalesced,
            self.purged
        )
    }
}

/// Lock-free counters behind [`CacheStats`], shared between layers.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
    coalesced: AtomicU64,
    purged: AtomicU64,
}

impl CacheCounters {
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
        self.bypasses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_purged(&self, keys: u64) {
        self.purged.fetch_add(keys, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            purged: self.purged.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let counters = CacheCounters::new();
        assert_eq!(counters.snapshot().hit_rate(), 0.0);

        counters.record_hit();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();

        assert!((counters.snapshot().hit_rate() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_display() {
        let stats = CacheStats {
            hits: 1,
            misses: 1,
            bypasses: 0,
            coalesced: 2,
            purged: 5,
        };
        assert_eq!(
            stats.to_string(),
            "hits=1 misses=1 hit_rate=50.0% bypasses=0 coalesced=2 purged=5"
        );
    }
}
