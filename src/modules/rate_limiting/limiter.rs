//! Keyed rate limiter.

use super::bucket::TokenBucket;
use super::config::RateLimitConfig;
use super::error::{RateLimitError, RateLimitResult};
use crate::component::{Component, ComponentStatus, MetricsPayload};
use crate::primitives::LruMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Decision from a rate limit check.
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitDecision {
    /// Whether the request is allowed.
    pub allowed: bool,

    /// Whole tokens left for the key after this check.
    pub tokens_remaining: u64,

    /// Bucket capacity.
    pub tokens_limit: u64,

    /// Time until the next token (zero when allowed).
    pub retry_after: Duration,
}

impl RateLimitDecision {
    fn allowed(tokens_remaining: u64, tokens_limit: u64) -> Self {
        Self {
            allowed: true,
            tokens_remaining,
            tokens_limit,
            retry_after: Duration::ZERO,
        }
    }

    fn denied(tokens_limit: u64, retry_after: Duration) -> Self {
        Self {
            allowed: false,
            tokens_remaining: 0,
            tokens_limit,
            retry_after,
        }
    }

    /// Retry-after rounded up to whole seconds, at least 1.
    #[must_use]
    pub fn retry_after_secs(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs.max(1)
        }
    }
}

#[derive(Debug)]
struct BucketEntry {
    bucket: TokenBucket,
    last_seen: Instant,
}

/// Limiter statistics.
#[derive(Debug, Default)]
pub struct RateLimiterStats {
    /// Checks performed.
    pub checks: AtomicU64,
    /// Checks allowed.
    pub allowed: AtomicU64,
    /// Checks denied.
    pub denied: AtomicU64,
    /// Buckets dropped because the key map was full.
    pub evicted: AtomicU64,
    /// Buckets dropped after `idle_ttl`.
    pub expired: AtomicU64,
}

/// Token-bucket limiter keyed by caller identity.
///
/// Buckets live in an [`LruMap`] bounded by `max_tracked_keys`. A bucket idle
/// for longer than `idle_ttl` is treated as new on its next check and removed
/// by [`RateLimiter::purge_idle`].
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    buckets: Mutex<LruMap<String, BucketEntry>>,
    stats: RateLimiterStats,
}

impl RateLimiter {
    /// Create a limiter.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Config`] if the configuration is invalid.
    pub fn new(config: RateLimitConfig) -> RateLimitResult<Self> {
        config.validate().into_result()?;

        info!(
            enabled = config.enabled,
            requests_per_second = config.requests_per_second,
            burst_size = config.burst_size,
            "Rate limiter created"
        );

        Ok(Self {
            buckets: Mutex::new(LruMap::new(config.max_tracked_keys)),
            config,
            stats: RateLimiterStats::default(),
        })
    }

    /// Configuration.
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Statistics.
    #[must_use]
    pub fn stats(&self) -> &RateLimiterStats {
        &self.stats
    }

    /// Number of keys currently tracked.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.buckets.lock().len()
    }

    /// Take one token for `key`.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        self.check_n(key, 1)
    }

    /// Take `tokens` tokens for `key`.
    pub fn check_n(&self, key: &str, tokens: u64) -> RateLimitDecision {
        self.stats.checks.fetch_add(1, Ordering::Relaxed);

        if !self.config.enabled {
            self.stats.allowed.fetch_add(1, Ordering::Relaxed);
            return RateLimitDecision::allowed(u64::MAX, u64::MAX);
        }

        let now = Instant::now();
        let mut buckets = self.buckets.lock();

        let decision = match buckets.get_mut(key) {
            Some(entry) => {
                if now.saturating_duration_since(entry.last_seen) > self.config.idle_ttl {
                    self.stats.expired.fetch_add(1, Ordering::Relaxed);
                    entry.bucket.reset(now);
                }
                entry.last_seen = now;
                Self::consume(&mut entry.bucket, tokens, now)
            },
            None => {
                let mut bucket =
                    TokenBucket::new(self.config.burst_size, self.config.requests_per_second, now);
                let decision = Self::consume(&mut bucket, tokens, now);
                let entry = BucketEntry {
                    bucket,
                    last_seen: now,
                };
                if let Some((evicted, _)) = buckets.set(key.to_string(), entry) {
                    self.stats.evicted.fetch_add(1, Ordering::Relaxed);
                    debug!(key = %evicted, "Rate limit bucket evicted");
                }
                decision
            },
        };
        drop(buckets);

        if decision.allowed {
            self.stats.allowed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.stats.denied.fetch_add(1, Ordering::Relaxed);
            debug!(key, retry_after = ?decision.retry_after, "Rate limited");
        }
        decision
    }

    /// Like [`RateLimiter::check`] but returns an error when denied.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitError::Exceeded`] when `key` has no tokens left.
    pub fn acquire(&self, key: &str) -> RateLimitResult<RateLimitDecision> {
        let decision = self.check(key);
        if decision.allowed {
            Ok(decision)
        } else {
            Err(RateLimitError::Exceeded {
                key: key.to_string(),
                retry_after: decision.retry_after,
            })
        }
    }

    /// Remove buckets idle for longer than `idle_ttl`. Returns how many were removed.
    pub fn purge_idle(&self) -> usize {
        let now = Instant::now();
        let mut buckets = self.buckets.lock();

        // Least recently seen first, so stop at the first live bucket.
        let idle: Vec<String> = buckets
            .iter()
            .take_while(|(_, entry)| {
                now.saturating_duration_since(entry.last_seen) > self.config.idle_ttl
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &idle {
            buckets.remove(key.as_str());
        }
        drop(buckets);

        if !idle.is_empty() {
            self.stats
                .expired
                .fetch_add(idle.len() as u64, Ordering::Relaxed);
            debug!(count = idle.len(), "Purged idle rate limit buckets");
        }
        idle.len()
    }

    /// Forget every bucket.
    pub fn reset(&self) {
        self.buckets.lock().clear();
    }

    fn consume(bucket: &mut TokenBucket, tokens: u64, now: Instant) -> RateLimitDecision {
        if bucket.try_consume(tokens, now) {
            RateLimitDecision::allowed(bucket.available(now) as u64, bucket.capacity())
        } else {
            RateLimitDecision::denied(bucket.capacity(), bucket.time_until_available(tokens, now))
        }
    }
}

impl Component for RateLimiter {
    fn name(&self) -> &'static str {
        "rate_limiter"
    }

    fn status(&self) -> ComponentStatus {
        if self.config.enabled {
            ComponentStatus::Running
        } else {
            ComponentStatus::Stopped
        }
    }

    fn metrics(&self) -> MetricsPayload {
        let mut payload = MetricsPayload::new();
        payload.counter("checks", self.stats.checks.load(Ordering::Relaxed));
        payload.counter("allowed", self.stats.allowed.load(Ordering::Relaxed));
        payload.counter("denied", self.stats.denied.load(Ordering::Relaxed));
        payload.counter("evicted", self.stats.evicted.load(Ordering::Relaxed));
        payload.counter("expired", self.stats.expired.load(Ordering::Relaxed));
        payload.gauge("tracked_keys", self.tracked_keys() as f64);
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn limiter(rps: f64, burst: u64) -> RateLimiter {
        RateLimiter::new(RateLimitConfig::new(rps, burst)).unwrap()
    }

    #[test]
    fn test_burst_per_key() {
        let limiter = limiter(1.0, 3);

        for _ in 0..3 {
            assert!(limiter.check("a").allowed);
        }
        let denied = limiter.check("a");
        assert!(!denied.allowed);
        assert!(denied.retry_after > Duration::ZERO);
        assert_eq!(denied.retry_after_secs(), 1);

        // Keys are independent.
        assert!(limiter.check("b").allowed);
        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(limiter.stats().denied.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_acquire_error() {
        let limiter = limiter(1.0, 1);
        assert!(limiter.acquire("a").is_ok());
        assert!(matches!(
            limiter.acquire("a"),
            Err(RateLimitError::Exceeded { ref key, .. }) if key == "a"
        ));
    }

    #[test]
    fn test_key_map_is_bounded() {
        let limiter = RateLimiter::new(RateLimitConfig {
            max_tracked_keys: 2,
            ..RateLimitConfig::new(1.0, 1)
        })
        .unwrap();

        assert!(limiter.check("a").allowed);
        assert!(limiter.check("b").allowed);
        assert!(limiter.check("c").allowed);
        assert_eq!(limiter.tracked_keys(), 2);
        assert_eq!(limiter.stats().evicted.load(Ordering::Relaxed), 1);

        // "a" was evicted, so it starts with a fresh bucket.
        assert!(limiter.check("a").allowed);
    }

    #[test]
    fn test_idle_buckets_expire() {
        let limiter = RateLimiter::new(RateLimitConfig {
            idle_ttl: Duration::from_millis(20),
            ..RateLimitConfig::new(0.001, 1)
        })
        .unwrap();

        assert!(limiter.check("a").allowed);
        assert!(!limiter.check("a").allowed);

        thread::sleep(Duration::from_millis(40));
        assert!(limiter.check("a").allowed);

        thread::sleep(Duration::from_millis(40));
        assert_eq!(limiter.purge_idle(), 1);
        assert_eq!(limiter.tracked_keys(), 0);
    }

    #[test]
    fn test_disabled_allows_everything() {
        let limiter = RateLimiter::new(RateLimitConfig {
            enabled: false,
            ..RateLimitConfig::new(1.0, 1)
        })
        .unwrap();
        for _ in 0..100 {
            assert!(limiter.check("a").allowed);
        }
        assert_eq!(limiter.tracked_keys(), 0);
        assert_eq!(limiter.status(), ComponentStatus::Stopped);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(RateLimiter::new(RateLimitConfig::new(0.0, 1)).is_err());
    }

    #[test]
    fn test_concurrent_checks_never_exceed_burst() {
        let limiter = Arc::new(limiter(0.001, 50));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                thread::spawn(move || (0..20).filter(|_| limiter.check("shared").allowed).count())
            })
            .collect();

        let allowed: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(allowed, 50);
    }

    #[test]
    fn test_metrics() {
        let limiter = limiter(1.0, 1);
        limiter.check("a");
        limiter.check("a");
        let metrics = limiter.metrics();
        assert_eq!(metrics.counters["checks"], 2);
        assert_eq!(metrics.counters["denied"], 1);
        assert_eq!(metrics.gauges["tracked_keys"], 1.0);
    }
}
