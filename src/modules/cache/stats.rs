//! Cache statistics.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one level.
#[derive(Debug, Default)]
pub(crate) struct LevelCounters {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
}

/// Live counters for the whole cache.
#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    pub hot: LevelCounters,
    pub warm: LevelCounters,
    /// Lookups that missed both levels.
    pub misses: AtomicU64,
    /// Misses answered by the key pre-filter without taking the lock.
    pub filtered: AtomicU64,
    pub promotions: AtomicU64,
    pub demotions: AtomicU64,
    pub expirations: AtomicU64,
    pub rejected: AtomicU64,
}

fn ratio(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}

/// Statistics for one level.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LevelStats {
    /// Live entries.
    pub entries: usize,
    /// Entry capacity.
    pub capacity: usize,
    /// Hits at this level.
    pub hits: u64,
    /// Lookups that reached this level and missed.
    pub misses: u64,
    /// Entries evicted from this level (demotions are not evictions).
    pub evictions: u64,
    /// Accounted bytes.
    pub memory_usage_bytes: usize,
    /// Byte budget.
    pub memory_limit_bytes: usize,
    /// `hits / (hits + misses)`.
    pub hit_ratio: f64,
}

impl LevelStats {
    pub(crate) fn from_counters(
        counters: &LevelCounters,
        entries: usize,
        capacity: usize,
        memory_usage_bytes: usize,
        memory_limit_bytes: usize,
    ) -> Self {
        let hits = counters.hits.load(Ordering::Relaxed);
        let misses = counters.misses.load(Ordering::Relaxed);
        Self {
            entries,
            capacity,
            hits,
            misses,
            evictions: counters.evictions.load(Ordering::Relaxed),
            memory_usage_bytes,
            memory_limit_bytes,
            hit_ratio: ratio(hits, misses),
        }
    }
}

/// Combined cache statistics, recomputed on each call.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Hot level.
    pub hot: LevelStats,
    /// Warm level.
    pub warm: LevelStats,
    /// Hits at either level.
    pub hits: u64,
    /// Lookups that found nothing.
    pub misses: u64,
    /// Misses answered by the key pre-filter.
    pub filtered_misses: u64,
    /// Entries evicted from either level.
    pub evictions: u64,
    /// Warm to hot moves.
    pub promotions: u64,
    /// Hot to warm moves.
    pub demotions: u64,
    /// Entries dropped on expiry.
    pub expirations: u64,
    /// Writes rejected as too large.
    pub rejected_writes: u64,
    /// Warm entries currently compressed.
    pub compressed_entries: usize,
    /// Accounted bytes across both levels.
    pub memory_usage_bytes: usize,
    /// Memory ceiling.
    pub memory_limit_bytes: usize,
    /// `hits / (hits + misses)`.
    pub hit_ratio: f64,
}

impl CacheStats {
    pub(crate) fn combine(
        counters: &CacheCounters,
        hot: LevelStats,
        warm: LevelStats,
        compressed_entries: usize,
        memory_limit_bytes: usize,
    ) -> Self {
        let hits = hot.hits + warm.hits;
        let misses = counters.misses.load(Ordering::Relaxed);
        Self {
            hits,
            misses,
            filtered_misses: counters.filtered.load(Ordering::Relaxed),
            evictions: hot.evictions + warm.evictions,
            promotions: counters.promotions.load(Ordering::Relaxed),
            demotions: counters.demotions.load(Ordering::Relaxed),
            expirations: counters.expirations.load(Ordering::Relaxed),
            rejected_writes: counters.rejected.load(Ordering::Relaxed),
            compressed_entries,
            memory_usage_bytes: hot.memory_usage_bytes + warm.memory_usage_bytes,
            memory_limit_bytes,
            hit_ratio: ratio(hits, misses),
            hot,
            warm,
        }
    }

    /// Total live entries.
    #[must_use]
    pub fn entries(&self) -> usize {
        self.hot.entries + self.warm.entries
    }
}
