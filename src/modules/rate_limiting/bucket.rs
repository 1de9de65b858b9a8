//! Token bucket.

use std::time::{Duration, Instant};

/// A token bucket refilled continuously at `refill_rate` tokens per second.
///
/// The bucket allows bursts up to `capacity` while limiting the long-term
/// rate to `refill_rate`. It is not synchronized; the limiter owns every
/// bucket behind its map lock.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket.
    #[must_use]
    pub fn new(capacity: u64, refill_rate: f64, now: Instant) -> Self {
        Self {
            capacity: capacity as f64,
            refill_rate,
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Take `tokens` if available.
    pub fn try_consume(&mut self, tokens: u64, now: Instant) -> bool {
        self.refill(now);
        let needed = tokens as f64;
        if self.tokens >= needed {
            self.tokens -= needed;
            true
        } else {
            false
        }
    }

    /// Tokens available at `now`.
    #[must_use]
    pub fn available(&self, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * self.refill_rate).min(self.capacity)
    }

    /// Time until `tokens` are available.
    #[must_use]
    pub fn time_until_available(&self, tokens: u64, now: Instant) -> Duration {
        let deficit = tokens as f64 - self.available(now);
        if deficit <= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(deficit / self.refill_rate)
        }
    }

    /// Bucket capacity.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity as u64
    }

    /// Refill the bucket to capacity.
    pub fn reset(&mut self, now: Instant) {
        self.tokens = self.capacity;
        self.last_refill = now;
    }

    fn refill(&mut self, now: Instant) {
        self.tokens = self.available(now);
        self.last_refill = now.max(self.last_refill);
    }
}
