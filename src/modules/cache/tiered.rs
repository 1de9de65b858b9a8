//! Two-level cache.
//!
//! Both levels live behind one mutex so a promotion or demotion is a single
//! critical section. A bloom filter of inserted keys answers most misses
//! before the lock is taken.

use super::compression;
use super::config::CacheConfig;
use super::entry::{CacheEntry, CacheLevel, EntryInfo, SetOptions};
use super::error::{CacheError, CacheResult};
use super::stats::{CacheCounters, CacheStats, LevelStats};
use crate::component::{Component, ComponentStatus, MetricsPayload};
use crate::primitives::{BloomFilter, BoyerMoore, LruMap};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use regex::Regex;
use serde::Serialize;
use std::sync::atomic::Ordering;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of [`TieredCache::optimize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OptimizeResult {
    /// Accounted bytes released.
    pub memory_freed: usize,
    /// Entries expired, demoted or compressed.
    pub entries_optimized: usize,
    /// Expired entries removed.
    pub expired: usize,
    /// Cold hot entries moved to warm.
    pub demoted: usize,
    /// Warm entries compressed.
    pub compressed: usize,
    /// Whether the key pre-filter was rebuilt.
    pub filter_rebuilt: bool,
}

struct Levels {
    hot: LruMap<String, CacheEntry>,
    warm: LruMap<String, CacheEntry>,
    hot_bytes: usize,
    warm_bytes: usize,
}

impl Levels {
    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.hot.remove(key) {
            self.hot_bytes -= entry.size_bytes;
            return Some(entry);
        }
        let entry = self.warm.remove(key)?;
        self.warm_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn total_bytes(&self) -> usize {
        self.hot_bytes + self.warm_bytes
    }
}

/// Two-level (hot/warm) in-process cache.
pub struct TieredCache {
    config: CacheConfig,
    hot_budget: usize,
    warm_budget: usize,
    levels: Mutex<Levels>,
    filter: RwLock<BloomFilter>,
    counters: CacheCounters,
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("hot_budget", &self.hot_budget)
            .field("warm_budget", &self.warm_budget)
            .field("counters", &self.counters)
            .finish_non_exhaustive()
    }
}

impl TieredCache {
    /// Create a cache.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Config`] if the configuration is invalid.
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate().into_result()?;

        let hot_budget = config.hot_memory_bytes();
        let warm_budget = config.warm_memory_bytes();
        let filter = BloomFilter::new(
            config.l1_max_size + config.l2_max_size,
            config.bloom_false_positive_rate,
        );

        info!(
            l1_max_size = config.l1_max_size,
            l2_max_size = config.l2_max_size,
            hot_budget_bytes = hot_budget,
            warm_budget_bytes = warm_budget,
            compression = config.compression_enabled,
            "Tiered cache created"
        );

        Ok(Self {
            levels: Mutex::new(Levels {
                hot: LruMap::new(config.l1_max_size),
                warm: LruMap::new(config.l2_max_size),
                hot_bytes: 0,
                warm_bytes: 0,
            }),
            filter: RwLock::new(filter),
            counters: CacheCounters::default(),
            hot_budget,
            warm_budget,
            config,
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a value. Warm hits count towards promotion to hot.
    ///
    /// A warm entry that fails to decompress is dropped and reported as a miss.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        match self.try_get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Dropping unreadable cache entry");
                None
            },
        }
    }

    /// Look up a value, surfacing decompression failures.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Decompression`] if a compressed entry is corrupt.
    /// The entry is removed either way.
    pub fn try_get(&self, key: &str) -> CacheResult<Option<Bytes>> {
        if !self.filter.read().test(key) {
            self.record_filtered_miss();
            return Ok(None);
        }
        let mut levels = self.levels.lock();
        self.lookup(&mut levels, key, Instant::now())
    }

    /// Look up several keys under one lock acquisition.
    pub fn get_batch<K: AsRef<str>>(&self, keys: &[K]) -> Vec<Option<Bytes>> {
        let now = Instant::now();
        let mut levels = self.levels.lock();
        keys.iter()
            .map(|key| {
                let key = key.as_ref();
                if !self.filter.read().test(key) {
                    self.record_filtered_miss();
                    return None;
                }
                self.lookup(&mut levels, key, now).unwrap_or_else(|e| {
                    warn!(error = %e, "Dropping unreadable cache entry");
                    None
                })
            })
            .collect()
    }

    /// Whether a live entry exists, without counting a hit.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let now = Instant::now();
        let levels = self.levels.lock();
        levels
            .hot
            .peek(key)
            .or_else(|| levels.warm.peek(key))
            .is_some_and(|entry| !entry.is_expired(now))
    }

    /// Insert at hot with the hot default TTL.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::EntryTooLarge`] if the entry fits neither level's
    /// memory budget.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Bytes>) -> CacheResult<()> {
        self.set_with(key, value, SetOptions::default())
    }

    /// Insert with an explicit TTL or level.
    ///
    /// An entry too large for the requested level's budget goes to the other
    /// level if it fits there.
    ///
    /// # Errors
    ///
    /// See [`TieredCache::set`].
    pub fn set_with(
        &self,
        key: impl Into<String>,
        value: impl Into<Bytes>,
        options: SetOptions,
    ) -> CacheResult<()> {
        let key = key.into();
        let value = value.into();
        let level = self.placement(&key, value.len(), options)?;
        let mut levels = self.levels.lock();
        self.insert_new(&mut levels, key, value, level, options, Instant::now());
        Ok(())
    }

    /// Insert several entries under one lock acquisition.
    ///
    /// Every entry is checked against the budgets before anything is written,
    /// so a rejected batch leaves the cache unchanged.
    ///
    /// # Errors
    ///
    /// See [`TieredCache::set`].
    pub fn set_batch<K, V, I>(&self, entries: I) -> CacheResult<usize>
    where
        K: Into<String>,
        V: Into<Bytes>,
        I: IntoIterator<Item = (K, V)>,
    {
        let options = SetOptions::default();
        let placed = entries
            .into_iter()
            .map(|(k, v)| {
                let key = k.into();
                let value = v.into();
                let level = self.placement(&key, value.len(), options)?;
                Ok((key, value, level))
            })
            .collect::<CacheResult<Vec<_>>>()?;

        let now = Instant::now();
        let count = placed.len();
        let mut levels = self.levels.lock();
        for (key, value, level) in placed {
            self.insert_new(&mut levels, key, value, level, options, now);
        }
        Ok(count)
    }

    /// Remove an entry. Returns `true` if it existed.
    pub fn delete(&self, key: &str) -> bool {
        self.levels.lock().remove(key).is_some()
    }

    /// Remove every key matching `pattern`. Returns the number removed.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidPattern`] if `pattern` is not a valid regex.
    pub fn invalidate(&self, pattern: &str) -> CacheResult<usize> {
        let regex = Regex::new(pattern)?;
        Ok(self.invalidate_where(|key| regex.is_match(key)))
    }

    /// Remove every key containing `needle` as a substring.
    pub fn invalidate_containing(&self, needle: &str) -> usize {
        let matcher = BoyerMoore::new(needle);
        self.invalidate_where(|key| matcher.is_match(key))
    }

    fn invalidate_where(&self, mut matches: impl FnMut(&str) -> bool) -> usize {
        let mut levels = self.levels.lock();
        let doomed: Vec<String> = levels
            .hot
            .keys()
            .into_iter()
            .chain(levels.warm.keys())
            .filter(|key| matches(key.as_str()))
            .collect();

        for key in &doomed {
            levels.remove(key);
        }

        debug!(removed = doomed.len(), "Invalidated cache entries");
        doomed.len()
    }

    /// Remove every entry and reset the key pre-filter.
    pub fn clear(&self) {
        let mut levels = self.levels.lock();
        levels.hot.clear();
        levels.warm.clear();
        levels.hot_bytes = 0;
        levels.warm_bytes = 0;
        self.filter.read().clear();
    }

    /// Bookkeeping for one entry, without counting a hit.
    #[must_use]
    pub fn entry_info(&self, key: &str) -> Option<EntryInfo> {
        let now = Instant::now();
        let levels = self.levels.lock();
        levels
            .hot
            .peek(key)
            .or_else(|| levels.warm.peek(key))
            .map(|entry| entry.info(key, now))
    }

    /// Purge expired entries, demote cold hot entries and compress large warm
    /// entries. Running it twice in a row changes nothing the second time.
    pub fn optimize(&self) -> OptimizeResult {
        let now = Instant::now();
        let mut levels = self.levels.lock();
        let before = levels.total_bytes();
        let mut result = OptimizeResult::default();

        let expired: Vec<String> = levels
            .hot
            .iter()
            .chain(levels.warm.iter())
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            levels.remove(key);
        }
        result.expired = expired.len();
        self.counters
            .expirations
            .fetch_add(expired.len() as u64, Ordering::Relaxed);

        let cold: Vec<String> = levels
            .hot
            .iter()
            .filter(|(_, entry)| {
                now.saturating_duration_since(entry.last_accessed_at) >= self.config.cold_after
            })
            .map(|(key, _)| key.clone())
            .collect();
        for key in cold {
            if let Some(entry) = levels.hot.remove(&key) {
                levels.hot_bytes -= entry.size_bytes;
                self.demote(&mut levels, key, entry, now);
                result.demoted += 1;
            }
        }

        if self.config.compression_enabled {
            result.compressed = self.compress_warm(&mut levels);
        }

        let live_keys = levels.hot.len() + levels.warm.len();
        if self.filter.read().is_saturated() {
            let expected = (self.config.l1_max_size + self.config.l2_max_size).max(live_keys * 2);
            let rebuilt = BloomFilter::new(expected, self.config.bloom_false_positive_rate);
            for (key, _) in levels.hot.iter().chain(levels.warm.iter()) {
                rebuilt.add(key.as_str());
            }
            *self.filter.write() = rebuilt;
            result.filter_rebuilt = true;
        }

        result.memory_freed = before.saturating_sub(levels.total_bytes());
        result.entries_optimized = result.expired + result.demoted + result.compressed;

        debug!(
            freed_bytes = result.memory_freed,
            expired = result.expired,
            demoted = result.demoted,
            compressed = result.compressed,
            filter_rebuilt = result.filter_rebuilt,
            "Cache optimized"
        );
        result
    }

    /// Current statistics.
    #[must_use]
    pub fn get_stats(&self) -> CacheStats {
        let levels = self.levels.lock();
        let hot = LevelStats::from_counters(
            &self.counters.hot,
            levels.hot.len(),
            levels.hot.capacity(),
            levels.hot_bytes,
            self.hot_budget,
        );
        let warm = LevelStats::from_counters(
            &self.counters.warm,
            levels.warm.len(),
            levels.warm.capacity(),
            levels.warm_bytes,
            self.warm_budget,
        );
        let compressed = levels.warm.iter().filter(|(_, e)| e.compressed).count();

        CacheStats::combine(
            &self.counters,
            hot,
            warm,
            compressed,
            self.hot_budget + self.warm_budget,
        )
    }

    /// Accounted bytes across both levels.
    #[must_use]
    pub fn memory_usage_bytes(&self) -> usize {
        self.levels.lock().total_bytes()
    }

    fn record_filtered_miss(&self) {
        self.counters.filtered.fetch_add(1, Ordering::Relaxed);
        self.counters.hot.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.warm.misses.fetch_add(1, Ordering::Relaxed);
        self.counters.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Pick the level an entry of `value_len` bytes can live in.
    fn placement(&self, key: &str, value_len: usize, options: SetOptions) -> CacheResult<CacheLevel> {
        let size = key.len() + value_len;
        let requested = options.level.unwrap_or(CacheLevel::Hot);
        let (first, second) = match requested {
            CacheLevel::Hot => (CacheLevel::Hot, CacheLevel::Warm),
            CacheLevel::Warm => (CacheLevel::Warm, CacheLevel::Hot),
        };

        for level in [first, second] {
            if size <= self.budget(level) {
                if level != requested {
                    debug!(key, size, %requested, placed = %level, "Entry placed below requested level");
                }
                return Ok(level);
            }
        }

        self.counters.rejected.fetch_add(1, Ordering::Relaxed);
        let limit = self.hot_budget.max(self.warm_budget);
        warn!(key, size, limit, "Rejected oversized cache entry");
        Err(CacheError::EntryTooLarge {
            key: key.to_string(),
            size,
            limit,
        })
    }

    fn budget(&self, level: CacheLevel) -> usize {
        match level {
            CacheLevel::Hot => self.hot_budget,
            CacheLevel::Warm => self.warm_budget,
        }
    }

    fn default_ttl(&self, level: CacheLevel) -> std::time::Duration {
        match level {
            CacheLevel::Hot => self.config.l1_ttl,
            CacheLevel::Warm => self.config.l2_ttl,
        }
    }

    fn insert_new(
        &self,
        levels: &mut Levels,
        key: String,
        value: Bytes,
        level: CacheLevel,
        options: SetOptions,
        now: Instant,
    ) {
        if levels.remove(&key).is_none() {
            self.filter.read().add(key.as_str());
        }

        let ttl = options.ttl.unwrap_or_else(|| self.default_ttl(level));
        let entry = CacheEntry::new(key.len(), value, level, ttl, options.ttl.is_some(), now);
        match level {
            CacheLevel::Hot => self.insert_hot(levels, key, entry, now),
            CacheLevel::Warm => self.insert_warm(levels, key, entry),
        }
    }

    /// Insert into hot, demoting least-recently-used hot entries as needed.
    fn insert_hot(&self, levels: &mut Levels, key: String, entry: CacheEntry, now: Instant) {
        while levels.hot_bytes + entry.size_bytes > self.hot_budget
            || levels.hot.len() >= levels.hot.capacity()
        {
            let Some((lru_key, lru_entry)) = levels.hot.evict_lru() else {
                break;
            };
            levels.hot_bytes -= lru_entry.size_bytes;
            self.demote(levels, lru_key, lru_entry, now);
        }

        levels.hot_bytes += entry.size_bytes;
        levels.hot.set(key, entry);
    }

    /// Insert into warm, evicting least-recently-used warm entries as needed.
    fn insert_warm(&self, levels: &mut Levels, key: String, entry: CacheEntry) {
        if entry.size_bytes > self.warm_budget {
            self.counters.hot.evictions.fetch_add(1, Ordering::Relaxed);
            debug!(key = %key, size = entry.size_bytes, "Entry too large for warm level, dropped");
            return;
        }

        while levels.warm_bytes + entry.size_bytes > self.warm_budget
            || levels.warm.len() >= levels.warm.capacity()
        {
            let Some((_, evicted)) = levels.warm.evict_lru() else {
                break;
            };
            levels.warm_bytes -= evicted.size_bytes;
            self.counters.warm.evictions.fetch_add(1, Ordering::Relaxed);
        }

        levels.warm_bytes += entry.size_bytes;
        levels.warm.set(key, entry);
    }

    fn demote(&self, levels: &mut Levels, key: String, mut entry: CacheEntry, now: Instant) {
        entry.relevel(CacheLevel::Warm, self.config.l2_ttl, now);
        self.counters.demotions.fetch_add(1, Ordering::Relaxed);
        debug!(key = %key, "Demoted entry to warm");
        self.insert_warm(levels, key, entry);
    }

    fn lookup(&self, levels: &mut Levels, key: &str, now: Instant) -> CacheResult<Option<Bytes>> {
        if let Some(hit) = self.lookup_level(levels, CacheLevel::Hot, key, now) {
            return Ok(Some(hit.value));
        }

        let Some(mut entry) = self.lookup_level(levels, CacheLevel::Warm, key, now) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let value = if entry.compressed {
            match compression::decompress(&entry.value) {
                Ok(raw) => raw,
                Err(message) => {
                    levels.remove(key);
                    return Err(CacheError::Decompression {
                        key: key.to_string(),
                        message,
                    });
                },
            }
        } else {
            entry.value.clone()
        };

        entry.warm_hits += 1;
        let promote = entry.warm_hits >= self.config.promote_after_hits
            && key.len() + value.len() <= self.hot_budget;

        if promote {
            if let Some(mut stored) = levels.warm.remove(key) {
                levels.warm_bytes -= stored.size_bytes;
                if stored.compressed {
                    stored.replace_value(value.clone(), false);
                    stored.incompressible = false;
                }
                stored.relevel(CacheLevel::Hot, self.config.l1_ttl, now);
                self.counters.promotions.fetch_add(1, Ordering::Relaxed);
                debug!(key, "Promoted entry to hot");
                self.insert_hot(levels, key.to_string(), stored, now);
            }
        } else if let Some(stored) = levels.warm.peek_mut(key) {
            stored.warm_hits = entry.warm_hits;
        }

        Ok(Some(value))
    }

    /// Hit-or-miss at one level. Expired entries are removed and count as misses.
    /// Returns a clone of the live entry on a hit.
    fn lookup_level(
        &self,
        levels: &mut Levels,
        level: CacheLevel,
        key: &str,
        now: Instant,
    ) -> Option<CacheEntry> {
        let (map, counters) = match level {
            CacheLevel::Hot => (&mut levels.hot, &self.counters.hot),
            CacheLevel::Warm => (&mut levels.warm, &self.counters.warm),
        };

        let outcome = map.get_mut(key).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                entry.touch(now);
                Some(entry.clone())
            }
        });

        match outcome {
            Some(Some(entry)) => {
                counters.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry)
            },
            Some(None) => {
                if let Some(expired) = map.remove(key) {
                    match level {
                        CacheLevel::Hot => levels.hot_bytes -= expired.size_bytes,
                        CacheLevel::Warm => levels.warm_bytes -= expired.size_bytes,
                    }
                }
                self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            },
            None => {
                counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            },
        }
    }

    fn compress_warm(&self, levels: &mut Levels) -> usize {
        let threshold = self.config.compression_threshold_bytes;
        let mut compressed = 0;

        for key in levels.warm.keys() {
            let Some(entry) = levels.warm.peek_mut(&key) else {
                continue;
            };
            if entry.compressed || entry.incompressible || entry.value.len() < threshold {
                continue;
            }

            match compression::compress(&entry.value) {
                Some(frame) => {
                    let before = entry.size_bytes;
                    entry.replace_value(frame, true);
                    levels.warm_bytes -= before - entry.size_bytes;
                    compressed += 1;
                },
                None => entry.incompressible = true,
            }
        }

        compressed
    }
}

impl Component for TieredCache {
    fn name(&self) -> &'static str {
        "cache"
    }

    fn status(&self) -> ComponentStatus {
        let usage = self.memory_usage_bytes();
        let limit = self.hot_budget + self.warm_budget;
        if limit > 0 && usage as f64 >= limit as f64 * 0.95 {
            ComponentStatus::Degraded {
                reason: format!("memory at {usage} of {limit} bytes"),
            }
        } else {
            ComponentStatus::Running
        }
    }

    fn metrics(&self) -> MetricsPayload {
        let stats = self.get_stats();
        let mut metrics = MetricsPayload::new();

        metrics.counter("hits", stats.hits);
        metrics.counter("misses", stats.misses);
        metrics.counter("filtered_misses", stats.filtered_misses);
        metrics.counter("evictions", stats.evictions);
        metrics.counter("promotions", stats.promotions);
        metrics.counter("demotions", stats.demotions);
        metrics.counter("expirations", stats.expirations);
        metrics.counter("rejected_writes", stats.rejected_writes);
        metrics.gauge("hit_ratio", stats.hit_ratio);
        metrics.gauge("hot_entries", stats.hot.entries as f64);
        metrics.gauge("warm_entries", stats.warm.entries as f64);
        metrics.gauge("hot_memory_bytes", stats.hot.memory_usage_bytes as f64);
        metrics.gauge("warm_memory_bytes", stats.warm.memory_usage_bytes as f64);
        metrics.gauge("memory_limit_bytes", stats.memory_limit_bytes as f64);

        metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn small_config() -> CacheConfig {
        CacheConfig {
            l1_max_size: 2,
            l2_max_size: 4,
            ..CacheConfig::default()
        }
    }

    /// Budget of 1 KiB total: 256 bytes hot, 768 bytes warm.
    fn tight_config() -> CacheConfig {
        CacheConfig {
            max_memory_usage_mb: 1.0 / 1024.0,
            ..CacheConfig::default()
        }
    }

    #[test]
    fn test_get_set_and_miss() {
        let cache = TieredCache::new(CacheConfig::default()).unwrap();
        cache.set("user:1", "alice").unwrap();

        assert_eq!(cache.get("user:1"), Some(Bytes::from_static(b"alice")));
        assert_eq!(cache.get("user:2"), None);

        let stats = cache.get_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hot.entries, 1);
    }

    #[test]
    fn test_invalid_config() {
        let config = CacheConfig {
            l1_max_size: 0,
            ..CacheConfig::default()
        };
        assert!(matches!(
            TieredCache::new(config),
            Err(CacheError::Config(_))
        ));
    }

    #[test]
    fn test_hot_overflow_demotes_then_promotes() {
        let cache = TieredCache::new(small_config()).unwrap();
        cache.set("a", "1").unwrap();
        cache.set("b", "2").unwrap();
        cache.set("c", "3").unwrap();

        assert_eq!(cache.entry_info("a").unwrap().level, CacheLevel::Warm);
        assert_eq!(cache.entry_info("c").unwrap().level, CacheLevel::Hot);

        // Warm hit promotes "a" and pushes the hot LRU ("b") down.
        assert_eq!(cache.get("a"), Some(Bytes::from_static(b"1")));
        assert_eq!(cache.entry_info("a").unwrap().level, CacheLevel::Hot);
        assert_eq!(cache.entry_info("b").unwrap().level, CacheLevel::Warm);

        let stats = cache.get_stats();
        assert_eq!(stats.promotions, 1);
        assert_eq!(stats.demotions, 2);
        assert_eq!(stats.warm.hits, 1);
    }

    #[test]
    fn test_promote_after_hits() {
        let cache = TieredCache::new(CacheConfig {
            promote_after_hits: 2,
            ..small_config()
        })
        .unwrap();
        cache
            .set_with("k", "v", SetOptions::default().at_level(CacheLevel::Warm))
            .unwrap();

        cache.get("k");
        assert_eq!(cache.entry_info("k").unwrap().level, CacheLevel::Warm);
        cache.get("k");
        assert_eq!(cache.entry_info("k").unwrap().level, CacheLevel::Hot);
    }

    #[test]
    fn test_warm_overflow_evicts_lru() {
        let cache = TieredCache::new(small_config()).unwrap();
        for i in 0..7 {
            cache.set(format!("k{i}"), "v").unwrap();
        }

        // 2 hot + 4 warm; k0 was the warm LRU.
        assert!(!cache.contains("k0"));
        assert!(cache.contains("k1"));
        let stats = cache.get_stats();
        assert_eq!(stats.entries(), 6);
        assert_eq!(stats.warm.evictions, 1);
    }

    #[test]
    fn test_memory_ceiling_never_exceeded() {
        let config = tight_config();
        let limit = config.max_memory_bytes();
        let cache = TieredCache::new(config).unwrap();

        for i in 0..200 {
            cache.set(format!("key-{i}"), vec![b'x'; 40 + i % 60]).unwrap();
            assert!(cache.memory_usage_bytes() <= limit);
            let stats = cache.get_stats();
            assert!(stats.hot.memory_usage_bytes <= stats.hot.memory_limit_bytes);
            assert!(stats.warm.memory_usage_bytes <= stats.warm.memory_limit_bytes);
        }

        cache.optimize();
        assert!(cache.memory_usage_bytes() <= limit);
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let cache = TieredCache::new(tight_config()).unwrap();

        // Too large for hot (256) but fits warm (768).
        cache.set("medium", vec![0u8; 500]).unwrap();
        assert_eq!(cache.entry_info("medium").unwrap().level, CacheLevel::Warm);

        let err = cache.set("huge", vec![0u8; 2000]).unwrap_err();
        assert!(matches!(err, CacheError::EntryTooLarge { size: 2004, .. }));
        assert_eq!(cache.get_stats().rejected_writes, 1);
    }

    #[test]
    fn test_ttl_lazy_expiry() {
        let cache = TieredCache::new(CacheConfig::default()).unwrap();
        cache
            .set_with(
                "short",
                "v",
                SetOptions::default().with_ttl(Duration::from_millis(20)),
            )
            .unwrap();
        assert!(cache.get("short").is_some());

        std::thread::sleep(Duration::from_millis(30));
        assert!(cache.get("short").is_none());
        assert_eq!(cache.get_stats().expirations, 1);
        assert_eq!(cache.memory_usage_bytes(), 0);
    }

    #[test]
    fn test_optimize_purges_demotes_compresses() {
        let cache = TieredCache::new(CacheConfig {
            cold_after: Duration::from_millis(20),
            compression_threshold_bytes: 64,
            ..CacheConfig::default()
        })
        .unwrap();

        cache
            .set_with(
                "expiring",
                "v",
                SetOptions::default().with_ttl(Duration::from_millis(10)),
            )
            .unwrap();
        cache.set("doc", "lorem ipsum ".repeat(100)).unwrap();
        std::thread::sleep(Duration::from_millis(30));

        let before = cache.memory_usage_bytes();
        let result = cache.optimize();
        assert_eq!(result.expired, 1);
        assert_eq!(result.demoted, 1);
        assert_eq!(result.compressed, 1);
        assert_eq!(result.entries_optimized, 3);
        assert_eq!(result.memory_freed, before - cache.memory_usage_bytes());

        let info = cache.entry_info("doc").unwrap();
        assert_eq!(info.level, CacheLevel::Warm);
        assert!(info.compressed);

        // Compressed entries read back intact.
        assert_eq!(
            cache.get("doc"),
            Some(Bytes::from("lorem ipsum ".repeat(100)))
        );
    }

    #[test]
    fn test_optimize_is_idempotent() {
        let cache = TieredCache::new(CacheConfig {
            compression_threshold_bytes: 16,
            ..CacheConfig::default()
        })
        .unwrap();
        cache
            .set_with(
                "blob",
                "abc".repeat(200),
                SetOptions::default().at_level(CacheLevel::Warm),
            )
            .unwrap();

        let first = cache.optimize();
        assert_eq!(first.compressed, 1);

        let second = cache.optimize();
        assert_eq!(second.entries_optimized, 0);
        assert_eq!(second.memory_freed, 0);
    }

    #[test]
    fn test_invalidate_pattern() {
        let cache = TieredCache::new(small_config()).unwrap();
        cache
            .set_batch([("user:1", "a"), ("user:2", "b"), ("order:1", "c")])
            .unwrap();

        assert_eq!(cache.invalidate("^user:").unwrap(), 2);
        assert!(cache.contains("order:1"));
        assert!(matches!(
            cache.invalidate("("),
            Err(CacheError::InvalidPattern(_))
        ));
        assert_eq!(cache.invalidate_containing("der"), 1);
        assert_eq!(cache.get_stats().entries(), 0);
    }

    #[test]
    fn test_batch_operations() {
        let cache = TieredCache::new(CacheConfig::default()).unwrap();
        assert_eq!(cache.set_batch([("a", "1"), ("b", "2")]).unwrap(), 2);

        let values = cache.get_batch(&["a", "missing", "b"]);
        assert_eq!(
            values,
            vec![
                Some(Bytes::from_static(b"1")),
                None,
                Some(Bytes::from_static(b"2"))
            ]
        );
    }

    #[test]
    fn test_rejected_batch_writes_nothing() {
        let cache = TieredCache::new(tight_config()).unwrap();
        let result = cache.set_batch([
            ("ok".to_string(), vec![0u8; 4]),
            ("huge".to_string(), vec![0u8; 4096]),
        ]);
        assert!(result.is_err());
        assert!(!cache.contains("ok"));
    }

    #[test]
    fn test_filter_answers_unknown_keys() {
        let cache = TieredCache::new(CacheConfig::default()).unwrap();
        cache.set("present", "v").unwrap();

        for i in 0..100 {
            assert!(cache.get(&format!("absent-{i}")).is_none());
        }
        let stats = cache.get_stats();
        assert_eq!(stats.misses, 100);
        assert!(stats.filtered_misses >= 90);
    }

    #[test]
    fn test_filter_rebuilt_when_saturated() {
        let cache = TieredCache::new(CacheConfig {
            l1_max_size: 2,
            l2_max_size: 2,
            ..CacheConfig::default()
        })
        .unwrap();
        for i in 0..10 {
            cache.set(format!("k{i}"), "v").unwrap();
        }

        assert!(cache.optimize().filter_rebuilt);
        assert!(!cache.optimize().filter_rebuilt);
        // Live keys survive the rebuild.
        assert!(cache.get("k9").is_some());
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let cache = TieredCache::new(small_config()).unwrap();
        cache.set("k", "old").unwrap();
        cache.set("k", "newer").unwrap();

        assert_eq!(cache.get("k"), Some(Bytes::from_static(b"newer")));
        assert_eq!(cache.memory_usage_bytes(), 6);
    }

    #[test]
    fn test_component_metrics() {
        let cache = TieredCache::new(CacheConfig::default()).unwrap();
        cache.set("k", "v").unwrap();
        cache.get("k");

        let metrics = cache.metrics();
        assert_eq!(metrics.counters.get("hits"), Some(&1));
        assert_eq!(cache.status(), ComponentStatus::Running);
        assert!(cache.render_prometheus().contains("cache_hit_ratio 1"));
    }
}
