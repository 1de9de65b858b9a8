//! Per-instance circuit breaker.
//!
//! ```text
//!            threshold failures            timeout elapsed
//!  Closed ─────────────────────▶ Open ─────────────────────▶ HalfOpen
//!    ▲                            ▲                              │
//!    │         probe failed       │                              │
//!    │        (clock reset)       └──────────────────────────────┤
//!    └───────────────────────────────────────────────────────────┘
//!                          probe succeeded
//! ```
//!
//! Only one probe is admitted while half-open. A successful health probe
//! moves an open circuit straight to half-open.

use super::config::LoadBalancerConfig;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected until the open timeout elapses.
    Open,
    /// A single probe request is allowed through.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// How a request was admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Circuit closed.
    Normal,
    /// The single half-open probe.
    Probe,
}

/// Circuit breaker settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub threshold: u32,
    /// Time spent open before a probe is allowed.
    pub open_timeout: Duration,
    /// A failure further than this from the previous one starts a new streak.
    pub failure_window: Duration,
}

impl From<&LoadBalancerConfig> for CircuitBreakerConfig {
    fn from(config: &LoadBalancerConfig) -> Self {
        Self {
            threshold: config.circuit_breaker_threshold.max(1),
            open_timeout: config.circuit_breaker_timeout,
            failure_window: config.failure_window,
        }
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self::from(&LoadBalancerConfig::default())
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    /// Most recent failure of the current streak.
    last_failure_at: Option<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

/// A circuit breaker guarding one instance.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
    times_opened: AtomicU64,
}

impl CircuitBreaker {
    /// Create a closed circuit breaker.
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                last_failure_at: None,
                opened_at: None,
                probe_in_flight: false,
            }),
            times_opened: AtomicU64::new(0),
        }
    }

    /// Get the current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Get the consecutive failure count.
    #[must_use]
    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Time since the circuit last opened, while it is open or half-open.
    #[must_use]
    pub fn open_for(&self) -> Option<Duration> {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => None,
            _ => inner.opened_at.map(|t| t.elapsed()),
        }
    }

    /// Number of Closed/HalfOpen → Open transitions.
    #[must_use]
    pub fn times_opened(&self) -> u64 {
        self.times_opened.load(Ordering::Relaxed)
    }

    /// Whether [`CircuitBreaker::try_acquire`] would currently admit a request.
    #[must_use]
    pub fn is_available(&self) -> bool {
        let inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.timeout_elapsed(&inner),
            CircuitState::HalfOpen => !inner.probe_in_flight,
        }
    }

    /// Try to admit a request.
    ///
    /// An open circuit whose timeout has elapsed moves to half-open and
    /// admits the caller as its probe.
    pub fn try_acquire(&self) -> Option<Admission> {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => Some(Admission::Normal),
            CircuitState::Open => {
                if !self.timeout_elapsed(&inner) {
                    return None;
                }
                inner.state = CircuitState::HalfOpen;
                inner.probe_in_flight = true;
                info!(instance = %self.name, "Circuit half-open, admitting probe");
                Some(Admission::Probe)
            },
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    None
                } else {
                    inner.probe_in_flight = true;
                    Some(Admission::Probe)
                }
            },
        }
    }

    /// Record a successful request.
    pub fn record_success(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        match (inner.state, admission) {
            (CircuitState::HalfOpen, Admission::Probe) => {
                inner.state = CircuitState::Closed;
                inner.consecutive_failures = 0;
                inner.last_failure_at = None;
                inner.opened_at = None;
                inner.probe_in_flight = false;
                info!(instance = %self.name, "Circuit closed after successful probe");
            },
            (CircuitState::Closed, _) => {
                inner.consecutive_failures = 0;
                inner.last_failure_at = None;
            },
            // Requests admitted before the circuit opened finishing late.
            _ => {},
        }
    }

    /// Record a failed request.
    pub fn record_failure(&self, admission: Admission) {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        match (inner.state, admission) {
            (CircuitState::Closed, _) => {
                let stale = inner
                    .last_failure_at
                    .is_some_and(|last| now.duration_since(last) > self.config.failure_window);
                if stale {
                    inner.consecutive_failures = 0;
                }
                inner.last_failure_at = Some(now);
                inner.consecutive_failures += 1;

                debug!(
                    instance = %self.name,
                    failures = inner.consecutive_failures,
                    threshold = self.config.threshold,
                    "Recorded failure"
                );

                if inner.consecutive_failures >= self.config.threshold {
                    self.open(&mut inner, now);
                }
            },
            (CircuitState::HalfOpen, Admission::Probe) => {
                inner.consecutive_failures += 1;
                self.open(&mut inner, now);
            },
            _ => {},
        }
    }

    /// Release a probe slot without an outcome (the request was cancelled).
    pub fn abandon_probe(&self) {
        let mut inner = self.inner.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
        }
    }

    /// Apply an out-of-band health probe result.
    ///
    /// A healthy probe moves an open circuit to half-open without waiting for
    /// the timeout. Other states are left alone.
    pub fn record_health_probe(&self, healthy: bool) {
        let mut inner = self.inner.lock();
        if healthy && inner.state == CircuitState::Open {
            inner.state = CircuitState::HalfOpen;
            inner.probe_in_flight = false;
            info!(instance = %self.name, "Health probe passed, circuit half-open");
        }
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        inner.state = CircuitState::Open;
        inner.opened_at = Some(now);
        inner.probe_in_flight = false;
        self.times_opened.fetch_add(1, Ordering::Relaxed);
        warn!(
            instance = %self.name,
            failures = inner.consecutive_failures,
            open_for_ms = self.config.open_timeout.as_millis() as u64,
            "Circuit opened"
        );
    }

    fn timeout_elapsed(&self, inner: &Inner) -> bool {
        inner
            .opened_at
            .is_none_or(|t| t.elapsed() >= self.config.open_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(threshold: u32, open_timeout_ms: u64) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                threshold,
                open_timeout: Duration::from_millis(open_timeout_ms),
                failure_window: Duration::from_secs(60),
            },
        )
    }

    #[test]
    fn test_opens_after_threshold() {
        let cb = breaker(3, 10_000);
        for _ in 0..2 {
            cb.record_failure(Admission::Normal);
            assert_eq!(cb.state(), CircuitState::Closed);
        }
        cb.record_failure(Admission::Normal);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.times_opened(), 1);
        assert!(cb.try_acquire().is_none());
        assert!(!cb.is_available());
    }

    #[test]
    fn test_success_resets_streak() {
        let cb = breaker(3, 10_000);
        cb.record_failure(Admission::Normal);
        cb.record_failure(Admission::Normal);
        cb.record_success(Admission::Normal);
        cb.record_failure(Admission::Normal);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 1);
    }

    #[test]
    fn test_stale_failures_do_not_accumulate() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                threshold: 2,
                open_timeout: Duration::from_secs(10),
                failure_window: Duration::from_millis(20),
            },
        );
        cb.record_failure(Admission::Normal);
        std::thread::sleep(Duration::from_millis(40));
        cb.record_failure(Admission::Normal);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 1);
    }

    #[test]
    fn test_failure_window_measured_from_previous_failure() {
        let cb = CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                threshold: 3,
                open_timeout: Duration::from_secs(10),
                failure_window: Duration::from_millis(200),
            },
        );
        // Spread over more than the window, but no gap exceeds it.
        cb.record_failure(Admission::Normal);
        std::thread::sleep(Duration::from_millis(120));
        cb.record_failure(Admission::Normal);
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(cb.consecutive_failures(), 2);
        cb.record_failure(Admission::Normal);
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_half_open_single_probe_success() {
        let cb = breaker(1, 20);
        cb.record_failure(Admission::Normal);
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(40));
        assert!(cb.is_available());
        assert_eq!(cb.try_acquire(), Some(Admission::Probe));
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        // Second caller is refused while the probe is in flight.
        assert!(cb.try_acquire().is_none());

        cb.record_success(Admission::Probe);
        assert_eq!(cb.state(), CircuitState::Closed);
        assert_eq!(cb.consecutive_failures(), 0);
        assert_eq!(cb.try_acquire(), Some(Admission::Normal));
    }

    #[test]
    fn test_half_open_probe_failure_resets_clock() {
        let cb = breaker(1, 30);
        cb.record_failure(Admission::Normal);
        std::thread::sleep(Duration::from_millis(50));

        assert_eq!(cb.try_acquire(), Some(Admission::Probe));
        cb.record_failure(Admission::Probe);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.times_opened(), 2);
        // Timeout restarted at the probe failure.
        assert!(cb.try_acquire().is_none());
        assert!(cb.open_for().is_some_and(|d| d < Duration::from_millis(30)));
    }

    #[test]
    fn test_late_results_ignored_while_open() {
        let cb = breaker(1, 10_000);
        cb.record_failure(Admission::Normal);
        cb.record_success(Admission::Normal);
        cb.record_failure(Admission::Normal);
        assert_eq!(cb.state(), CircuitState::Open);
        assert_eq!(cb.times_opened(), 1);
    }

    #[test]
    fn test_abandoned_probe_frees_slot() {
        let cb = breaker(1, 0);
        cb.record_failure(Admission::Normal);
        assert_eq!(cb.try_acquire(), Some(Admission::Probe));
        cb.abandon_probe();
        assert_eq!(cb.try_acquire(), Some(Admission::Probe));
    }

    #[test]
    fn test_health_probe_shortens_recovery() {
        let cb = breaker(1, 60_000);
        cb.record_failure(Admission::Normal);
        cb.record_health_probe(false);
        assert_eq!(cb.state(), CircuitState::Open);

        cb.record_health_probe(true);
        assert_eq!(cb.state(), CircuitState::HalfOpen);
        assert_eq!(cb.try_acquire(), Some(Admission::Probe));
    }
}
