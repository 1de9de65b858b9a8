//! Backend instances and connection accounting.

use super::circuit::{Admission, CircuitBreaker, CircuitBreakerConfig, CircuitState};
use super::config::InstanceConfig;
use super::error::{LoadBalancerError, LoadBalancerResult};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Request statistics for a single instance.
#[derive(Debug, Default)]
pub struct InstanceStats {
    /// Requests admitted.
    pub total_requests: AtomicU64,
    /// Successful requests.
    pub successes: AtomicU64,
    /// Failed requests (including timeouts).
    pub failures: AtomicU64,
    /// Sum of request latencies in microseconds.
    pub total_latency_us: AtomicU64,
}

impl InstanceStats {
    /// Record a finished request.
    pub fn record(&self, success: bool, latency: Duration) {
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_us
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
    }

    /// Average latency of finished requests in milliseconds.
    #[must_use]
    pub fn average_latency_ms(&self) -> f64 {
        let finished =
            self.successes.load(Ordering::Relaxed) + self.failures.load(Ordering::Relaxed);
        if finished == 0 {
            return 0.0;
        }
        self.total_latency_us.load(Ordering::Relaxed) as f64 / finished as f64 / 1000.0
    }
}

/// A backend instance.
#[derive(Debug)]
pub struct Instance {
    id: String,
    endpoint: String,
    weight: u32,
    max_connections: u32,
    active_connections: AtomicU32,
    /// Advisory CPU usage, stored as `f64` bits.
    cpu_usage: AtomicU64,
    /// Advisory memory usage, stored as `f64` bits.
    memory_usage: AtomicU64,
    circuit: CircuitBreaker,
    stats: InstanceStats,
}

impl Instance {
    /// Create an instance. `default_max_connections` applies when the
    /// definition carries no cap of its own.
    #[must_use]
    pub fn new(
        config: &InstanceConfig,
        default_max_connections: u32,
        circuit: CircuitBreakerConfig,
    ) -> Self {
        Self {
            id: config.id.clone(),
            endpoint: config.endpoint.clone(),
            weight: config.weight,
            max_connections: config.max_connections.unwrap_or(default_max_connections).max(1),
            active_connections: AtomicU32::new(0),
            cpu_usage: AtomicU64::new(0f64.to_bits()),
            memory_usage: AtomicU64::new(0f64.to_bits()),
            circuit: CircuitBreaker::new(config.id.clone(), circuit),
            stats: InstanceStats::default(),
        }
    }

    /// Get the instance id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Get the weight.
    #[must_use]
    pub fn weight(&self) -> u32 {
        self.weight
    }

    /// Get the connection cap.
    #[must_use]
    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    /// Get the current active connection count.
    #[must_use]
    pub fn active_connections(&self) -> u32 {
        self.active_connections.load(Ordering::Acquire)
    }

    /// Get the circuit breaker.
    #[must_use]
    pub fn circuit(&self) -> &CircuitBreaker {
        &self.circuit
    }

    /// Get the circuit state.
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// Get request statistics.
    #[must_use]
    pub fn stats(&self) -> &InstanceStats {
        &self.stats
    }

    /// Get advisory CPU usage.
    #[must_use]
    pub fn cpu_usage(&self) -> f64 {
        f64::from_bits(self.cpu_usage.load(Ordering::Relaxed))
    }

    /// Get advisory memory usage.
    #[must_use]
    pub fn memory_usage(&self) -> f64 {
        f64::from_bits(self.memory_usage.load(Ordering::Relaxed))
    }

    /// Update advisory resource usage.
    pub fn set_load(&self, cpu_usage: f64, memory_usage: f64) {
        self.cpu_usage.store(cpu_usage.to_bits(), Ordering::Relaxed);
        self.memory_usage
            .store(memory_usage.to_bits(), Ordering::Relaxed);
    }

    /// Whether the instance could accept a request right now.
    ///
    /// Advisory only; admission is decided by [`Instance::try_admit`].
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.active_connections() < self.max_connections && self.circuit.is_available()
    }

    /// Reserve a connection slot and pass the circuit breaker.
    ///
    /// The slot is claimed with a compare-and-swap against the cap, so
    /// concurrent callers can never push the count past `max_connections`.
    ///
    /// # Errors
    ///
    /// Returns [`LoadBalancerError::AtCapacity`] or
    /// [`LoadBalancerError::CircuitOpen`].
    pub fn try_admit(self: &Arc<Self>) -> LoadBalancerResult<ConnectionGuard> {
        let mut current = self.active_connections.load(Ordering::Acquire);
        loop {
            if current >= self.max_connections {
                return Err(LoadBalancerError::AtCapacity(self.id.clone()));
            }
            match self.active_connections.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }

        match self.circuit.try_acquire() {
            Some(admission) => {
                self.stats.total_requests.fetch_add(1, Ordering::Relaxed);
                Ok(ConnectionGuard {
                    instance: Arc::clone(self),
                    admission,
                    finished: false,
                })
            },
            None => {
                self.active_connections.fetch_sub(1, Ordering::AcqRel);
                Err(LoadBalancerError::CircuitOpen(self.id.clone()))
            },
        }
    }

    /// Point-in-time view for reporting.
    #[must_use]
    pub fn snapshot(&self) -> InstanceSnapshot {
        InstanceSnapshot {
            id: self.id.clone(),
            endpoint: self.endpoint.clone(),
            weight: self.weight,
            active_connections: self.active_connections(),
            max_connections: self.max_connections,
            circuit_state: self.circuit.state(),
            consecutive_failures: self.circuit.consecutive_failures(),
            circuit_open_for_ms: self.circuit.open_for().map(|d| d.as_millis() as u64),
            cpu_usage: self.cpu_usage(),
            memory_usage: self.memory_usage(),
            total_requests: self.stats.total_requests.load(Ordering::Relaxed),
            successes: self.stats.successes.load(Ordering::Relaxed),
            failures: self.stats.failures.load(Ordering::Relaxed),
            average_latency_ms: self.stats.average_latency_ms(),
        }
    }
}

/// An admitted request on an instance.
///
/// Dropping the guard releases the connection slot. A guard dropped without
/// an outcome (the caller's future was cancelled) frees a half-open probe
/// slot without counting as success or failure.
#[derive(Debug)]
pub struct ConnectionGuard {
    instance: Arc<Instance>,
    admission: Admission,
    finished: bool,
}

impl ConnectionGuard {
    /// The instance this request runs on.
    #[must_use]
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Whether this request is a half-open probe.
    #[must_use]
    pub fn is_probe(&self) -> bool {
        self.admission == Admission::Probe
    }

    /// Record success and release the slot.
    pub fn success(mut self, latency: Duration) {
        self.finish(true, latency);
    }

    /// Record failure and release the slot.
    pub fn failure(mut self, latency: Duration) {
        self.finish(false, latency);
    }

    fn finish(&mut self, success: bool, latency: Duration) {
        self.finished = true;
        self.instance.stats.record(success, latency);
        if success {
            self.instance.circuit.record_success(self.admission);
        } else {
            self.instance.circuit.record_failure(self.admission);
        }
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if !self.finished && self.admission == Admission::Probe {
            self.instance.circuit.abandon_probe();
        }
        self.instance
            .active_connections
            .fetch_sub(1, Ordering::AcqRel);
    }
}

/// Serializable view of an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceSnapshot {
    /// Instance id.
    pub id: String,
    /// Endpoint.
    pub endpoint: String,
    /// Weight.
    pub weight: u32,
    /// Active connections.
    pub active_connections: u32,
    /// Connection cap.
    pub max_connections: u32,
    /// Circuit state.
    pub circuit_state: CircuitState,
    /// Consecutive failures in the current streak.
    pub consecutive_failures: u32,
    /// Time since the circuit opened, if not closed.
    pub circuit_open_for_ms: Option<u64>,
    /// Advisory CPU usage.
    pub cpu_usage: f64,
    /// Advisory memory usage.
    pub memory_usage: f64,
    /// Requests admitted.
    pub total_requests: u64,
    /// Successful requests.
    pub successes: u64,
    /// Failed requests.
    pub failures: u64,
    /// Average latency in milliseconds.
    pub average_latency_ms: f64,
}
