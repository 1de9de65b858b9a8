//! Periodic probing of open circuits.

use super::circuit::CircuitState;
use super::config::HealthCheckConfig;
use super::instance::Instance;
use parking_lot::RwLock;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Future returned by a health probe.
pub type ProbeFuture = Pin<Box<dyn Future<Output = bool> + Send>>;

/// Caller-supplied probe: resolves to `true` if the instance is healthy.
pub type HealthProbe = Arc<dyn Fn(Arc<Instance>) -> ProbeFuture + Send + Sync>;

/// Result of a health check.
#[derive(Debug, Clone)]
pub struct HealthCheckResult {
    /// Instance id.
    pub instance_id: String,
    /// Whether the probe passed.
    pub healthy: bool,
    /// Probe duration.
    pub response_time: Duration,
    /// Error message if the probe failed.
    pub error: Option<String>,
}

/// Health check executor.
pub struct HealthChecker {
    /// Health check configuration.
    config: HealthCheckConfig,
    /// Probe implementation.
    probe: HealthProbe,
}

impl std::fmt::Debug for HealthChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthChecker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HealthChecker {
    /// Create a new health checker.
    #[must_use]
    pub fn new(config: HealthCheckConfig, probe: HealthProbe) -> Self {
        Self { config, probe }
    }

    /// Check if health checks are enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Get the check interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Probe one instance, bounded by the configured timeout.
    pub async fn check(&self, instance: &Arc<Instance>) -> HealthCheckResult {
        let start = Instant::now();
        let outcome = timeout(self.config.timeout, (self.probe)(Arc::clone(instance))).await;
        let response_time = start.elapsed();

        let (healthy, error) = match outcome {
            Ok(true) => (true, None),
            Ok(false) => (false, Some("probe reported unhealthy".to_string())),
            Err(_) => (false, Some("probe timeout".to_string())),
        };

        if healthy {
            debug!(
                instance = %instance.id(),
                response_time_ms = response_time.as_millis() as u64,
                "Health check passed"
            );
        } else {
            warn!(
                instance = %instance.id(),
                error = error.as_deref().unwrap_or_default(),
                "Health check failed"
            );
        }

        HealthCheckResult {
            instance_id: instance.id().to_string(),
            healthy,
            response_time,
            error,
        }
    }

    /// Probe every instance whose circuit is open and feed the result to its breaker.
    pub async fn check_open(&self, instances: &[Arc<Instance>]) -> Vec<HealthCheckResult> {
        let mut results = Vec::new();

        for instance in instances {
            if instance.circuit_state() != CircuitState::Open {
                continue;
            }
            let result = self.check(instance).await;
            instance.circuit().record_health_probe(result.healthy);
            results.push(result);
        }

        results
    }
}

/// Health check task that runs periodically.
#[derive(Debug)]
pub struct HealthCheckTask {
    /// Health checker.
    checker: Arc<HealthChecker>,
    /// Instances to check.
    instances: Arc<RwLock<Vec<Arc<Instance>>>>,
    /// Shutdown signal.
    shutdown: mpsc::Receiver<()>,
}

impl HealthCheckTask {
    /// Create a new health check task.
    #[must_use]
    pub fn new(
        checker: HealthChecker,
        instances: Arc<RwLock<Vec<Arc<Instance>>>>,
        shutdown: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            checker: Arc::new(checker),
            instances,
            shutdown,
        }
    }

    /// Run the health check task until shutdown is signalled.
    pub async fn run(mut self) {
        if !self.checker.is_enabled() {
            debug!("Health checks disabled");
            return;
        }

        let interval = self.checker.interval();
        debug!(
            interval_ms = interval.as_millis() as u64,
            "Starting health check task"
        );

        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    debug!("Health check task shutting down");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let instances = self.instances.read().clone();
                    let results = self.checker.check_open(&instances).await;
                    let recovered = results.iter().filter(|r| r.healthy).count();

                    debug!(
                        probed = results.len(),
                        recovered,
                        "Health check cycle complete"
                    );
                }
            }
        }
    }
}
