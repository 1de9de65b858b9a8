//! Load balancer: instance registry, selection and routed execution.

use super::circuit::{CircuitBreakerConfig, CircuitState};
use super::config::{InstanceConfig, LoadBalancerConfig};
use super::error::{BoxError, LoadBalancerError, LoadBalancerResult};
use super::health::{HealthCheckTask, HealthChecker, HealthProbe};
use super::instance::{ConnectionGuard, Instance, InstanceSnapshot};
use super::strategy::StrategyContainer;
use crate::component::{Component, ComponentStatus, MetricsPayload};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Load balancer statistics.
#[derive(Debug, Default)]
pub struct LoadBalancerStats {
    /// Total selections made.
    pub total_selections: AtomicU64,
    /// Successful selections.
    pub successful_selections: AtomicU64,
    /// Failed selections (no eligible instance).
    pub failed_selections: AtomicU64,
    /// Routed operations that succeeded.
    pub successes: AtomicU64,
    /// Routed operations that failed, timeouts included.
    pub failures: AtomicU64,
    /// Routed operations that timed out.
    pub timeouts: AtomicU64,
}

impl LoadBalancerStats {
    /// Record a selection attempt.
    pub fn record_selection(&self, success: bool) {
        self.total_selections.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successful_selections.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed_selections.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record the outcome of a routed operation.
    pub fn record_outcome(&self, success: bool, timed_out: bool) {
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
        if timed_out {
            self.timeouts.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// Counts an operation as in flight for the duration of its lifetime.
struct InFlight<'a> {
    balancer: &'a LoadBalancer,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.balancer.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.balancer.drained.notify_waiters();
        }
    }
}

/// Load balancer over a set of backend instances.
pub struct LoadBalancer {
    config: LoadBalancerConfig,
    instances: Arc<RwLock<Vec<Arc<Instance>>>>,
    strategy: StrategyContainer,
    stats: LoadBalancerStats,
    in_flight: AtomicUsize,
    drained: Notify,
    shutting_down: AtomicBool,
    stopped: AtomicBool,
    health_task: Mutex<Option<(mpsc::Sender<()>, JoinHandle<()>)>>,
}

impl std::fmt::Debug for LoadBalancer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadBalancer")
            .field("strategy", &self.strategy.name())
            .field("instances", &self.instance_count())
            .field("in_flight", &self.in_flight.load(Ordering::Relaxed))
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl LoadBalancer {
    /// Create a load balancer and register the configured instances.
    ///
    /// # Errors
    ///
    /// Returns [`LoadBalancerError::Config`] if the configuration is invalid.
    pub fn new(config: LoadBalancerConfig) -> LoadBalancerResult<Self> {
        config.validate().into_result()?;

        let circuit = CircuitBreakerConfig::from(&config);
        let instances: Vec<Arc<Instance>> = config
            .instances
            .iter()
            .map(|def| Arc::new(Instance::new(def, config.max_connections, circuit)))
            .collect();

        info!(
            strategy = %config.strategy,
            instances = instances.len(),
            "Load balancer created"
        );

        Ok(Self {
            strategy: StrategyContainer::from_type(config.strategy),
            instances: Arc::new(RwLock::new(instances)),
            config,
            stats: LoadBalancerStats::default(),
            in_flight: AtomicUsize::new(0),
            drained: Notify::new(),
            shutting_down: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            health_task: Mutex::new(None),
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &LoadBalancerConfig {
        &self.config
    }

    /// Get load balancer statistics.
    #[must_use]
    pub fn stats(&self) -> &LoadBalancerStats {
        &self.stats
    }

    /// Get the active strategy name.
    #[must_use]
    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Number of registered instances.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.read().len()
    }

    /// Operations currently running.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Whether `shutdown()` has been called.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    /// Register an instance.
    ///
    /// # Errors
    ///
    /// Returns [`LoadBalancerError::InstanceAlreadyExists`] for a duplicate id
    /// and [`LoadBalancerError::ShuttingDown`] after shutdown began.
    pub fn add_instance(&self, definition: InstanceConfig) -> LoadBalancerResult<()> {
        if self.is_shutting_down() {
            return Err(LoadBalancerError::ShuttingDown);
        }

        let mut instances = self.instances.write();
        if instances.iter().any(|i| i.id() == definition.id) {
            return Err(LoadBalancerError::InstanceAlreadyExists(definition.id));
        }

        let instance = Instance::new(
            &definition,
            self.config.max_connections,
            CircuitBreakerConfig::from(&self.config),
        );
        info!(
            instance = %instance.id(),
            endpoint = %instance.endpoint(),
            weight = instance.weight(),
            "Instance added"
        );
        instances.push(Arc::new(instance));
        Ok(())
    }

    /// Deregister an instance. In-flight operations on it run to completion.
    ///
    /// # Errors
    ///
    /// Returns [`LoadBalancerError::InstanceNotFound`] if no instance has this id.
    pub fn remove_instance(&self, id: &str) -> LoadBalancerResult<()> {
        let mut instances = self.instances.write();
        let position = instances
            .iter()
            .position(|i| i.id() == id)
            .ok_or_else(|| LoadBalancerError::InstanceNotFound(id.to_string()))?;
        let removed = instances.remove(position);

        info!(
            instance = %id,
            active_connections = removed.active_connections(),
            "Instance removed"
        );
        Ok(())
    }

    /// Look up an instance by id.
    #[must_use]
    pub fn get_instance(&self, id: &str) -> Option<Arc<Instance>> {
        self.instances.read().iter().find(|i| i.id() == id).cloned()
    }

    /// Snapshots of every registered instance, in registration order.
    #[must_use]
    pub fn get_instances(&self) -> Vec<InstanceSnapshot> {
        self.instances.read().iter().map(|i| i.snapshot()).collect()
    }

    /// Update the advisory resource usage of an instance.
    ///
    /// # Errors
    ///
    /// Returns [`LoadBalancerError::InstanceNotFound`] if no instance has this id.
    pub fn update_instance_load(
        &self,
        id: &str,
        cpu_usage: f64,
        memory_usage: f64,
    ) -> LoadBalancerResult<()> {
        let instance = self
            .get_instance(id)
            .ok_or_else(|| LoadBalancerError::InstanceNotFound(id.to_string()))?;
        instance.set_load(cpu_usage, memory_usage);
        Ok(())
    }

    /// Pick an eligible instance and admit a request on it.
    ///
    /// An instance can lose eligibility between the strategy's choice and
    /// admission; selection is then retried over the remaining candidates.
    ///
    /// # Errors
    ///
    /// Returns [`LoadBalancerError::NoHealthyInstance`] when nothing is eligible
    /// and [`LoadBalancerError::ShuttingDown`] after shutdown began.
    pub fn select(&self) -> LoadBalancerResult<ConnectionGuard> {
        if self.is_shutting_down() {
            return Err(LoadBalancerError::ShuttingDown);
        }

        let instances = self.instances.read().clone();
        let strategy = self.strategy.as_strategy();

        for _ in 0..instances.len() {
            let candidates: Vec<Arc<Instance>> = instances
                .iter()
                .filter(|i| i.is_eligible())
                .cloned()
                .collect();

            let Some(index) = strategy.select(&candidates) else {
                break;
            };

            match candidates[index].try_admit() {
                Ok(guard) => {
                    self.stats.record_selection(true);
                    debug!(
                        instance = %guard.instance().id(),
                        strategy = strategy.name(),
                        probe = guard.is_probe(),
                        "Instance selected"
                    );
                    return Ok(guard);
                },
                Err(e) => debug!(error = %e, "Admission lost, reselecting"),
            }
        }

        self.stats.record_selection(false);
        warn!(registered = instances.len(), "No healthy instance available");
        Err(LoadBalancerError::NoHealthyInstance {
            registered: instances.len(),
        })
    }

    /// Run `op` on a selected instance, using the configured request timeout.
    ///
    /// # Errors
    ///
    /// Selection errors, [`LoadBalancerError::OperationTimeout`], or
    /// [`LoadBalancerError::Operation`] wrapping the operation's own error.
    pub async fn execute_request<F, Fut, T, E>(&self, op: F) -> LoadBalancerResult<T>
    where
        F: FnOnce(Arc<Instance>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        self.execute_request_with_timeout(op, self.config.request_timeout)
            .await
    }

    /// Run `op` on a selected instance with an explicit timeout.
    ///
    /// On expiry the operation is dropped and the attempt counts as a failure
    /// for the instance's circuit.
    ///
    /// # Errors
    ///
    /// See [`LoadBalancer::execute_request`].
    pub async fn execute_request_with_timeout<F, Fut, T, E>(
        &self,
        op: F,
        timeout: Option<Duration>,
    ) -> LoadBalancerResult<T>
    where
        F: FnOnce(Arc<Instance>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let _flight = self.enter()?;
        let guard = self.select()?;
        self.run_admitted(guard, op, timeout).await
    }

    /// Run `op` on a specific instance, bypassing the strategy.
    ///
    /// # Errors
    ///
    /// Returns [`LoadBalancerError::InstanceNotFound`],
    /// [`LoadBalancerError::CircuitOpen`] or [`LoadBalancerError::AtCapacity`]
    /// when the instance cannot take the request, otherwise as
    /// [`LoadBalancer::execute_request`].
    pub async fn execute_on_instance<F, Fut, T, E>(&self, id: &str, op: F) -> LoadBalancerResult<T>
    where
        F: FnOnce(Arc<Instance>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let _flight = self.enter()?;
        let instance = self
            .get_instance(id)
            .ok_or_else(|| LoadBalancerError::InstanceNotFound(id.to_string()))?;
        let guard = instance.try_admit()?;
        self.run_admitted(guard, op, self.config.request_timeout)
            .await
    }

    fn enter(&self) -> LoadBalancerResult<InFlight<'_>> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        let flight = InFlight { balancer: self };
        if self.is_shutting_down() {
            return Err(LoadBalancerError::ShuttingDown);
        }
        Ok(flight)
    }

    async fn run_admitted<F, Fut, T, E>(
        &self,
        guard: ConnectionGuard,
        op: F,
        timeout: Option<Duration>,
    ) -> LoadBalancerResult<T>
    where
        F: FnOnce(Arc<Instance>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Into<BoxError>,
    {
        let instance = Arc::clone(guard.instance());
        let start = Instant::now();

        let call = op(Arc::clone(&instance));
        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result.map_err(|e| LoadBalancerError::Operation {
                    instance: instance.id().to_string(),
                    source: e.into(),
                }),
                Err(_) => Err(LoadBalancerError::OperationTimeout {
                    instance: instance.id().to_string(),
                    timeout: limit,
                }),
            },
            None => call.await.map_err(|e| LoadBalancerError::Operation {
                instance: instance.id().to_string(),
                source: e.into(),
            }),
        };
        let latency = start.elapsed();

        match &outcome {
            Ok(_) => {
                self.stats.record_outcome(true, false);
                guard.success(latency);
            },
            Err(e) => {
                let timed_out = matches!(e, LoadBalancerError::OperationTimeout { .. });
                self.stats.record_outcome(false, timed_out);
                guard.failure(latency);
                debug!(
                    instance = %instance.id(),
                    latency_ms = latency.as_millis() as u64,
                    error = %e,
                    "Routed operation failed"
                );
            },
        }

        outcome
    }

    /// Start probing open circuits with `probe`.
    ///
    /// Returns `false` if health checks are disabled or already running.
    /// Must be called from within a Tokio runtime.
    pub fn start_health_checks(&self, probe: HealthProbe) -> bool {
        if !self.config.health_check.enabled {
            debug!("Health checks disabled by configuration");
            return false;
        }

        let mut slot = self.health_task.lock();
        if slot.is_some() {
            return false;
        }

        let (tx, rx) = mpsc::channel(1);
        let checker = HealthChecker::new(self.config.health_check.clone(), probe);
        let task = HealthCheckTask::new(checker, Arc::clone(&self.instances), rx);
        *slot = Some((tx, tokio::spawn(task.run())));

        info!(
            interval_ms = self.config.health_check.interval.as_millis() as u64,
            "Health checks started"
        );
        true
    }

    async fn stop_health_checks(&self) {
        let task = self.health_task.lock().take();
        if let Some((tx, handle)) = task {
            let _ = tx.send(()).await;
            if let Err(e) = handle.await {
                warn!(error = %e, "Health check task ended abnormally");
            }
        }
    }

    /// Stop accepting work, wait for in-flight operations, then clear instances.
    ///
    /// Waits at most `drain_timeout`. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            return;
        }

        info!(in_flight = self.in_flight(), "Load balancer shutting down");
        self.stop_health_checks().await;

        let drain = async {
            loop {
                let notified = self.drained.notified();
                if self.in_flight() == 0 {
                    break;
                }
                notified.await;
            }
        };

        if tokio::time::timeout(self.config.drain_timeout, drain)
            .await
            .is_err()
        {
            warn!(
                remaining = self.in_flight(),
                timeout_ms = self.config.drain_timeout.as_millis() as u64,
                "Drain timeout elapsed"
            );
        }

        self.instances.write().clear();
        self.stopped.store(true, Ordering::Release);
        info!("Load balancer stopped");
    }
}

impl Component for LoadBalancer {
    fn name(&self) -> &'static str {
        "load_balancer"
    }

    fn status(&self) -> ComponentStatus {
        if self.stopped.load(Ordering::Acquire) {
            return ComponentStatus::Stopped;
        }
        if self.is_shutting_down() {
            return ComponentStatus::Draining;
        }

        let instances = self.instances.read();
        if instances.is_empty() {
            return ComponentStatus::Degraded {
                reason: "no instances registered".to_string(),
            };
        }

        let open = instances
            .iter()
            .filter(|i| i.circuit_state() == CircuitState::Open)
            .count();
        if open > 0 {
            return ComponentStatus::Degraded {
                reason: format!("{open} of {} circuits open", instances.len()),
            };
        }

        ComponentStatus::Running
    }

    fn metrics(&self) -> MetricsPayload {
        let mut metrics = MetricsPayload::new();

        metrics.counter(
            "total_selections",
            self.stats.total_selections.load(Ordering::Relaxed),
        );
        metrics.counter(
            "successful_selections",
            self.stats.successful_selections.load(Ordering::Relaxed),
        );
        metrics.counter(
            "failed_selections",
            self.stats.failed_selections.load(Ordering::Relaxed),
        );
        metrics.counter("successes", self.stats.successes.load(Ordering::Relaxed));
        metrics.counter("failures", self.stats.failures.load(Ordering::Relaxed));
        metrics.counter("timeouts", self.stats.timeouts.load(Ordering::Relaxed));

        let instances = self.instances.read();
        let count_state =
            |state: CircuitState| instances.iter().filter(|i| i.circuit_state() == state).count();
        metrics.gauge("instances", instances.len() as f64);
        metrics.gauge("open_circuits", count_state(CircuitState::Open) as f64);
        metrics.gauge(
            "half_open_circuits",
            count_state(CircuitState::HalfOpen) as f64,
        );
        metrics.gauge(
            "active_connections",
            instances
                .iter()
                .map(|i| f64::from(i.active_connections()))
                .sum(),
        );
        metrics.gauge("in_flight", self.in_flight() as f64);

        metrics
    }
}

impl Drop for LoadBalancer {
    fn drop(&mut self) {
        if let Some((_, handle)) = self.health_task.get_mut().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::load_balancer::config::{HealthCheckConfig, StrategyType};
    use std::collections::HashMap;
    use std::io;

    fn config(strategy: StrategyType, count: usize) -> LoadBalancerConfig {
        LoadBalancerConfig {
            strategy,
            circuit_breaker_threshold: 3,
            circuit_breaker_timeout: Duration::from_millis(50),
            instances: (0..count)
                .map(|i| InstanceConfig::new(format!("node-{i}"), format!("http://10.0.0.{i}")))
                .collect(),
            ..LoadBalancerConfig::default()
        }
    }

    async fn ok_call(lb: &LoadBalancer) -> LoadBalancerResult<String> {
        lb.execute_request(|inst| async move { Ok::<_, io::Error>(inst.id().to_string()) })
            .await
    }

    async fn failing_call(lb: &LoadBalancer) -> LoadBalancerResult<()> {
        lb.execute_request(|_| async { Err::<(), _>(io::Error::other("boom")) })
            .await
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config(StrategyType::RoundRobin, 1);
        cfg.instances.push(InstanceConfig::new("node-0", "http://dup"));
        assert!(matches!(
            LoadBalancer::new(cfg),
            Err(LoadBalancerError::Config(_))
        ));
    }

    #[test]
    fn test_add_remove_instances() {
        let lb = LoadBalancer::new(config(StrategyType::RoundRobin, 1)).unwrap();

        lb.add_instance(InstanceConfig::new("extra", "http://extra"))
            .unwrap();
        assert_eq!(lb.instance_count(), 2);
        assert!(matches!(
            lb.add_instance(InstanceConfig::new("extra", "http://extra")),
            Err(LoadBalancerError::InstanceAlreadyExists(_))
        ));

        lb.remove_instance("extra").unwrap();
        assert!(matches!(
            lb.remove_instance("extra"),
            Err(LoadBalancerError::InstanceNotFound(_))
        ));
        assert_eq!(lb.get_instances()[0].id, "node-0");
    }

    #[tokio::test]
    async fn test_round_robin_exact_fairness() {
        let lb = LoadBalancer::new(config(StrategyType::RoundRobin, 4)).unwrap();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for _ in 0..40 {
            *counts.entry(ok_call(&lb).await.unwrap()).or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        assert!(counts.values().all(|&c| c == 10), "{counts:?}");
    }

    #[tokio::test]
    async fn test_least_connections_balances_held_requests() {
        let lb = LoadBalancer::new(config(StrategyType::LeastConnections, 3)).unwrap();

        let guards: Vec<ConnectionGuard> = (0..9).map(|_| lb.select().unwrap()).collect();
        let snapshots = lb.get_instances();
        let max = snapshots.iter().map(|s| s.active_connections).max().unwrap();
        let min = snapshots.iter().map(|s| s.active_connections).min().unwrap();
        assert!(max - min <= 1);
        drop(guards);

        assert!(lb.get_instances().iter().all(|s| s.active_connections == 0));
    }

    #[tokio::test]
    async fn test_circuit_opens_and_recovers_through_probe() {
        let lb = LoadBalancer::new(config(StrategyType::RoundRobin, 1)).unwrap();

        for _ in 0..3 {
            assert!(matches!(
                failing_call(&lb).await,
                Err(LoadBalancerError::Operation { .. })
            ));
        }
        assert_eq!(lb.get_instances()[0].circuit_state, CircuitState::Open);
        assert!(matches!(
            ok_call(&lb).await,
            Err(LoadBalancerError::NoHealthyInstance { registered: 1 })
        ));
        assert!(matches!(lb.status(), ComponentStatus::Degraded { .. }));

        tokio::time::sleep(Duration::from_millis(70)).await;

        // The single half-open probe succeeds and closes the circuit.
        assert_eq!(ok_call(&lb).await.unwrap(), "node-0");
        assert_eq!(lb.get_instances()[0].circuit_state, CircuitState::Closed);
        assert_eq!(lb.status(), ComponentStatus::Running);
    }

    #[tokio::test]
    async fn test_failed_probe_reopens() {
        let lb = LoadBalancer::new(config(StrategyType::RoundRobin, 1)).unwrap();
        for _ in 0..3 {
            let _ = failing_call(&lb).await;
        }

        tokio::time::sleep(Duration::from_millis(70)).await;
        assert!(failing_call(&lb).await.is_err());
        assert_eq!(lb.get_instances()[0].circuit_state, CircuitState::Open);

        // Timeout clock was reset by the failed probe.
        assert!(matches!(
            ok_call(&lb).await,
            Err(LoadBalancerError::NoHealthyInstance { .. })
        ));
    }

    #[tokio::test]
    async fn test_open_instance_skipped() {
        let lb = LoadBalancer::new(config(StrategyType::RoundRobin, 2)).unwrap();
        for _ in 0..3 {
            let _ = lb
                .execute_on_instance("node-0", |_| async {
                    Err::<(), _>(io::Error::other("down"))
                })
                .await;
        }

        for _ in 0..5 {
            assert_eq!(ok_call(&lb).await.unwrap(), "node-1");
        }
        assert!(matches!(
            lb.execute_on_instance("node-0", |_| async { Ok::<_, io::Error>(()) })
                .await,
            Err(LoadBalancerError::CircuitOpen(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout_recorded_as_failure() {
        let lb = LoadBalancer::new(config(StrategyType::RoundRobin, 1)).unwrap();

        let result = lb
            .execute_request_with_timeout(
                |_| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok::<_, io::Error>(())
                },
                Some(Duration::from_millis(10)),
            )
            .await;

        assert!(matches!(
            result,
            Err(LoadBalancerError::OperationTimeout { .. })
        ));
        let snap = &lb.get_instances()[0];
        assert_eq!(snap.failures, 1);
        assert_eq!(snap.consecutive_failures, 1);
        assert_eq!(snap.active_connections, 0);
        assert_eq!(lb.stats().timeouts.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_capacity_backpressure() {
        let mut cfg = config(StrategyType::RoundRobin, 1);
        cfg.max_connections = 2;
        let lb = LoadBalancer::new(cfg).unwrap();

        let _a = lb.select().unwrap();
        let _b = lb.select().unwrap();
        assert!(matches!(
            lb.select(),
            Err(LoadBalancerError::NoHealthyInstance { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_instance_load() {
        let lb = LoadBalancer::new(config(StrategyType::Weighted, 1)).unwrap();
        lb.update_instance_load("node-0", 55.0, 300.0).unwrap();
        let snap = &lb.get_instances()[0];
        assert_eq!(snap.cpu_usage, 55.0);
        assert_eq!(snap.memory_usage, 300.0);
        assert!(lb.update_instance_load("missing", 1.0, 1.0).is_err());
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight() {
        let lb = Arc::new(LoadBalancer::new(config(StrategyType::RoundRobin, 2)).unwrap());

        let worker = {
            let lb = Arc::clone(&lb);
            tokio::spawn(async move {
                lb.execute_request(|_| async {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    Ok::<_, io::Error>(7)
                })
                .await
            })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(lb.in_flight(), 1);

        lb.shutdown().await;

        assert_eq!(worker.await.unwrap().unwrap(), 7);
        assert_eq!(lb.in_flight(), 0);
        assert_eq!(lb.instance_count(), 0);
        assert_eq!(lb.status(), ComponentStatus::Stopped);
        assert!(matches!(
            ok_call(&lb).await,
            Err(LoadBalancerError::ShuttingDown)
        ));
    }

    #[tokio::test]
    async fn test_health_checks_shorten_recovery() {
        let mut cfg = config(StrategyType::RoundRobin, 1);
        cfg.circuit_breaker_timeout = Duration::from_secs(600);
        cfg.health_check = HealthCheckConfig {
            enabled: true,
            interval: Duration::from_millis(10),
            timeout: Duration::from_millis(50),
        };
        let lb = LoadBalancer::new(cfg).unwrap();
        for _ in 0..3 {
            let _ = failing_call(&lb).await;
        }
        assert_eq!(lb.get_instances()[0].circuit_state, CircuitState::Open);

        let probe: HealthProbe = Arc::new(|_| Box::pin(async { true }));
        assert!(lb.start_health_checks(Arc::clone(&probe)));
        assert!(!lb.start_health_checks(probe));

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(ok_call(&lb).await.unwrap(), "node-0");
        assert_eq!(lb.get_instances()[0].circuit_state, CircuitState::Closed);

        lb.shutdown().await;
    }

    #[tokio::test]
    async fn test_metrics_payload() {
        let lb = LoadBalancer::new(config(StrategyType::RoundRobin, 2)).unwrap();
        ok_call(&lb).await.unwrap();
        let _ = failing_call(&lb).await;

        let metrics = lb.metrics();
        assert_eq!(metrics.counters.get("successes"), Some(&1));
        assert_eq!(metrics.counters.get("failures"), Some(&1));
        assert_eq!(metrics.gauges.get("instances"), Some(&2.0));
        assert!(lb
            .render_prometheus()
            .contains("load_balancer_total_selections 2"));
    }
}
