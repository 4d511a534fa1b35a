//! Cache Statistics Module
//!
//! Tracks cache counters and produces structured diagnostic snapshots.

use std::collections::BTreeMap;

use serde::Serialize;

// == Cache Stats ==
/// Running counters for one cache instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of successful `get` lookups
    pub hits: u64,
    /// Number of `get` lookups for absent keys
    pub misses: u64,
    /// Number of entries evicted while reclaiming space
    pub evictions: u64,
    /// Number of eviction attempts refused by the close hook
    pub vetoes: u64,
    /// Number of insertions dropped because no room could be made
    pub rejections: u64,
    /// Current number of entries in the cache
    pub total_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no lookups have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }

    pub fn record_veto(&mut self) {
        self.vetoes += 1;
    }

    pub fn record_rejection(&mut self) {
        self.rejections += 1;
    }

    pub fn set_total_entries(&mut self, count: usize) {
        self.total_entries = count;
    }

    // == Merge ==
    /// Adds another instance's counters into this one.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.evictions += other.evictions;
        self.vetoes += other.vetoes;
        self.rejections += other.rejections;
        self.total_entries += other.total_entries;
    }
}

// == Diagnostics ==
/// Entry count and weight for one class of cached value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindSummary {
    pub count: usize,
    pub weight: usize,
}

/// Point-in-time dump of a cache's shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheDiagnostics {
    /// Entries reachable from the queue head
    pub queue_length: usize,
    /// Entries in the lookup table
    pub table_length: usize,
    pub current_space: usize,
    pub space_limit: usize,
    pub overflow: usize,
    /// `(current_space + overflow)` as a percentage of `space_limit`
    pub filling_ratio: f64,
    /// Entries grouped by the caller's classifier
    pub by_kind: BTreeMap<String, KindSummary>,
}

impl CacheDiagnostics {
    pub(crate) fn record(&mut self, kind: String, weight: usize) {
        let summary = self.by_kind.entry(kind).or_default();
        summary.count += 1;
        summary.weight += weight;
    }

    /// Folds another snapshot into this one.
    pub fn merge(&mut self, other: &CacheDiagnostics) {
        self.queue_length += other.queue_length;
        self.table_length += other.table_length;
        self.current_space += other.current_space;
        self.space_limit += other.space_limit;
        self.overflow += other.overflow;
        self.filling_ratio = filling_ratio(self.current_space, self.overflow, self.space_limit);
        for (kind, summary) in &other.by_kind {
            let mine = self.by_kind.entry(kind.clone()).or_default();
            mine.count += summary.count;
            mine.weight += summary.weight;
        }
    }
}

/// Percentage of the limit in use, counting overflow.
pub(crate) fn filling_ratio(current_space: usize, overflow: usize, space_limit: usize) -> f64 {
    if space_limit == 0 {
        return 0.0;
    }
    (current_space + overflow) as f64 * 100.0 / space_limit as f64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.vetoes, 0);
        assert_eq!(stats.rejections, 0);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        let stats = CacheStats::new();
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_hit();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.75);
    }

    #[test]
    fn test_merge_stats() {
        let mut left = CacheStats::new();
        left.record_hit();
        left.record_eviction();
        left.set_total_entries(3);

        let mut right = CacheStats::new();
        right.record_miss();
        right.record_veto();
        right.record_rejection();
        right.set_total_entries(2);

        left.merge(&right);
        assert_eq!(left.hits, 1);
        assert_eq!(left.misses, 1);
        assert_eq!(left.evictions, 1);
        assert_eq!(left.vetoes, 1);
        assert_eq!(left.rejections, 1);
        assert_eq!(left.total_entries, 5);
    }

    #[test]
    fn test_filling_ratio() {
        assert_eq!(filling_ratio(50, 0, 100), 50.0);
        assert_eq!(filling_ratio(110, 10, 100), 120.0);
        assert_eq!(filling_ratio(3, 0, 0), 0.0);
    }

    #[test]
    fn test_diagnostics_merge() {
        let mut left = CacheDiagnostics {
            queue_length: 1,
            table_length: 1,
            current_space: 4,
            space_limit: 10,
            ..Default::default()
        };
        left.record("header".into(), 4);

        let mut right = CacheDiagnostics {
            queue_length: 2,
            table_length: 2,
            current_space: 6,
            space_limit: 10,
            ..Default::default()
        };
        right.record("header".into(), 1);
        right.record("source".into(), 5);

        left.merge(&right);
        assert_eq!(left.queue_length, 3);
        assert_eq!(left.current_space, 10);
        assert_eq!(left.filling_ratio, 50.0);
        assert_eq!(left.by_kind["header"], KindSummary { count: 2, weight: 5 });
        assert_eq!(left.by_kind["source"], KindSummary { count: 1, weight: 5 });
    }
}
