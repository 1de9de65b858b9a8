//! Cache entries.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Cache level holding an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLevel {
    /// L1: small, recently used entries, never compressed.
    Hot,
    /// L2: larger capacity, may hold compressed entries.
    Warm,
}

impl std::fmt::Display for CacheLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Hot => write!(f, "hot"),
            Self::Warm => write!(f, "warm"),
        }
    }
}

/// Per-write options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Time-to-live overriding the level default. Kept across promotion and demotion.
    pub ttl: Option<Duration>,
    /// Level to insert at instead of hot.
    pub level: Option<CacheLevel>,
}

impl SetOptions {
    /// Set an explicit TTL.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Force the insertion level.
    #[must_use]
    pub fn at_level(mut self, level: CacheLevel) -> Self {
        self.level = Some(level);
        self
    }
}

/// A stored value and its bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    /// Stored bytes; lz4 frame when `compressed`.
    pub value: Bytes,
    /// Accounted size: key length plus stored value length.
    pub size_bytes: usize,
    pub created_at: Instant,
    pub expires_at: Option<Instant>,
    /// TTL was given by the caller and survives level changes.
    pub explicit_ttl: bool,
    pub level: CacheLevel,
    pub compressed: bool,
    /// Compression was tried and did not shrink the value.
    pub incompressible: bool,
    pub access_count: u64,
    /// Hits while warm since the last level change.
    pub warm_hits: u32,
    pub last_accessed_at: Instant,
}

impl CacheEntry {
    pub fn new(
        key_len: usize,
        value: Bytes,
        level: CacheLevel,
        ttl: Duration,
        explicit_ttl: bool,
        now: Instant,
    ) -> Self {
        Self {
            size_bytes: key_len + value.len(),
            value,
            created_at: now,
            expires_at: now.checked_add(ttl),
            explicit_ttl,
            level,
            compressed: false,
            incompressible: false,
            access_count: 0,
            warm_hits: 0,
            last_accessed_at: now,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    pub fn touch(&mut self, now: Instant) {
        self.access_count += 1;
        self.last_accessed_at = now;
    }

    /// Move to `level`, restarting the level's default TTL unless it was explicit.
    pub fn relevel(&mut self, level: CacheLevel, default_ttl: Duration, now: Instant) {
        self.level = level;
        self.warm_hits = 0;
        if !self.explicit_ttl {
            self.expires_at = now.checked_add(default_ttl);
        }
    }

    /// Replace the stored bytes, keeping the key share of `size_bytes`.
    pub fn replace_value(&mut self, value: Bytes, compressed: bool) {
        let key_len = self.size_bytes - self.value.len();
        self.size_bytes = key_len + value.len();
        self.value = value;
        self.compressed = compressed;
    }

    pub fn info(&self, key: &str, now: Instant) -> EntryInfo {
        EntryInfo {
            key: key.to_string(),
            level: self.level,
            size_bytes: self.size_bytes,
            compressed: self.compressed,
            access_count: self.access_count,
            age: now.saturating_duration_since(self.created_at),
            idle: now.saturating_duration_since(self.last_accessed_at),
            ttl_remaining: self
                .expires_at
                .map(|at| at.saturating_duration_since(now)),
        }
    }
}

/// Read-only view of an entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    /// Entry key.
    pub key: String,
    /// Current level.
    pub level: CacheLevel,
    /// Accounted size in bytes.
    pub size_bytes: usize,
    /// Whether the stored value is compressed.
    pub compressed: bool,
    /// Number of hits.
    pub access_count: u64,
    /// Time since insertion.
    pub age: Duration,
    /// Time since the last hit.
    pub idle: Duration,
    /// Time until expiry.
    pub ttl_remaining: Option<Duration>,
}
