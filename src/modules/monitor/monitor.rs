//! Sliding-window performance monitor.

use super::alert::{Alert, AlertKind, AlertManager};
use super::config::{AlertThresholds, MonitorConfig};
use super::error::{MonitorError, MonitorResult};
use super::snapshot::{CounterSnapshot, MonitorSnapshot, SNAPSHOT_VERSION};
use super::window::{MetricWindow, Sample};
use crate::component::{Component, ComponentStatus, MetricsPayload};
use crate::primitives::sort::{percentile_sorted, sort_floats};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Response-time statistics over the window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeMetrics {
    /// Samples in the window.
    pub samples: usize,
    /// Mean in milliseconds.
    pub average: f64,
    /// Median in milliseconds.
    pub p50: f64,
    /// 95th percentile in milliseconds.
    pub p95: f64,
    /// 99th percentile in milliseconds.
    pub p99: f64,
    /// Slowest sample in milliseconds.
    pub max: f64,
}

/// Throughput statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThroughputMetrics {
    /// Successes plus errors since creation or import.
    pub total_requests: u64,
    /// Outcomes in the window divided by the window's time span (at least one second).
    pub requests_per_second: f64,
}

/// Error statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorMetrics {
    /// Errors since creation or import.
    pub count: u64,
    /// Share of errors among the outcomes in the window.
    pub rate: f64,
}

/// Most recent resource usage samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceMetrics {
    /// Memory usage in megabytes.
    pub memory_mb: Option<f64>,
    /// CPU usage in percent.
    pub cpu_percent: Option<f64>,
}

/// Overall health.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    /// Score from 0 (unusable) to 100 (healthy).
    pub score: f64,
}

/// Metrics reported by [`PerformanceMonitor::get_metrics`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    /// Latency.
    pub response_time: ResponseTimeMetrics,
    /// Throughput.
    pub throughput: ThroughputMetrics,
    /// Errors.
    pub errors: ErrorMetrics,
    /// Resources.
    pub resources: ResourceMetrics,
    /// Health.
    pub health: HealthMetrics,
}

/// Health score in `[0, 100]`.
///
/// `100 * (1 - 0.6 * error_rate - 0.4 * avg / (avg + threshold))`, which never
/// increases as either the error rate or the average latency grows.
#[must_use]
pub fn health_score(error_rate: f64, average_ms: f64, response_time_threshold_ms: f64) -> f64 {
    let error_rate = error_rate.clamp(0.0, 1.0);
    let average_ms = average_ms.max(0.0);
    let latency_penalty = if average_ms == 0.0 {
        0.0
    } else {
        average_ms / (average_ms + response_time_threshold_ms.max(f64::MIN_POSITIVE))
    };
    (100.0 * (1.0 - 0.6 * error_rate - 0.4 * latency_penalty)).clamp(0.0, 100.0)
}

const SUCCESS: f64 = 0.0;
const ERROR: f64 = 1.0;

#[derive(Debug)]
struct State {
    response_times: MetricWindow,
    /// Success (0) and error (1) events in arrival order.
    outcomes: MetricWindow,
    memory: MetricWindow,
    cpu: MetricWindow,
    counters: CounterSnapshot,
}

impl State {
    fn new(capacity: usize) -> Self {
        Self {
            response_times: MetricWindow::new(capacity),
            outcomes: MetricWindow::new(capacity),
            memory: MetricWindow::new(capacity),
            cpu: MetricWindow::new(capacity),
            counters: CounterSnapshot::default(),
        }
    }

    fn window_error_rate(&self) -> f64 {
        // Values are 0 or 1, so the running sum stays exact.
        self.outcomes.running_mean()
    }

    fn metrics(&self, thresholds: &AlertThresholds) -> PerformanceMetrics {
        let mut latencies = self.response_times.values();
        let average = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };
        sort_floats(&mut latencies);

        let span_secs = self
            .outcomes
            .bounds()
            .map(|(first, last)| (last - first).num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);

        let error_rate = self.window_error_rate();

        PerformanceMetrics {
            response_time: ResponseTimeMetrics {
                samples: latencies.len(),
                average,
                p50: percentile_sorted(&latencies, 50.0),
                p95: percentile_sorted(&latencies, 95.0),
                p99: percentile_sorted(&latencies, 99.0),
                max: latencies.last().copied().unwrap_or(0.0),
            },
            throughput: ThroughputMetrics {
                total_requests: self.counters.successes + self.counters.errors,
                requests_per_second: self.outcomes.len() as f64 / span_secs.max(1.0),
            },
            errors: ErrorMetrics {
                count: self.counters.errors,
                rate: error_rate,
            },
            resources: ResourceMetrics {
                memory_mb: self.memory.latest().map(|s| s.value),
                cpu_percent: self.cpu.latest().map(|s| s.value),
            },
            health: HealthMetrics {
                score: health_score(error_rate, average, thresholds.response_time_ms),
            },
        }
    }
}

/// Which alert kinds a recording can affect.
#[derive(Debug, Clone, Copy)]
enum Check {
    Latency,
    Outcomes,
    Resources,
    All,
}

/// Collects latency, outcome and resource samples and raises threshold alerts.
#[derive(Debug)]
pub struct PerformanceMonitor {
    config: RwLock<MonitorConfig>,
    state: Mutex<State>,
    alerts: Mutex<AlertManager>,
}

impl PerformanceMonitor {
    /// Create a monitor.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Config`] if the configuration is invalid.
    pub fn new(config: MonitorConfig) -> MonitorResult<Self> {
        config.validate().into_result()?;

        info!(
            window_size = config.window_size,
            sampling_rate = config.sampling_rate,
            "Performance monitor created"
        );

        Ok(Self {
            state: Mutex::new(State::new(config.window_size)),
            alerts: Mutex::new(AlertManager::new(
                config.alert_cooldown,
                config.alert_history_size,
            )),
            config: RwLock::new(config),
        })
    }

    /// Create a monitor from an exported snapshot.
    ///
    /// # Errors
    ///
    /// See [`PerformanceMonitor::import_data`].
    pub fn from_snapshot(data: &str) -> MonitorResult<Self> {
        let monitor = Self::new(MonitorConfig::default())?;
        monitor.import_data(data)?;
        Ok(monitor)
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> MonitorConfig {
        self.config.read().clone()
    }

    /// Record one response time in milliseconds. Subject to `sampling_rate`.
    pub fn record_response_time(&self, duration_ms: f64, label: &str) {
        if !duration_ms.is_finite() || duration_ms < 0.0 {
            debug!(duration_ms, "Ignoring invalid response time");
            return;
        }

        let sampling_rate = self.config.read().sampling_rate;
        {
            let mut state = self.state.lock();
            if sampling_rate < 1.0 && !rand::rng().random_bool(sampling_rate) {
                state.counters.sampled_out += 1;
                return;
            }
            state
                .response_times
                .push(Sample::now(duration_ms, label_of(label)));
        }
        self.evaluate(Check::Latency);
    }

    /// Record a response time given as a [`Duration`].
    pub fn record_duration(&self, duration: Duration, label: &str) {
        self.record_response_time(duration.as_secs_f64() * 1000.0, label);
    }

    /// Record a successful operation.
    pub fn record_success(&self, label: &str) {
        {
            let mut state = self.state.lock();
            state.outcomes.push(Sample::now(SUCCESS, label_of(label)));
            state.counters.successes += 1;
        }
        self.evaluate(Check::Outcomes);
    }

    /// Record a failed operation. Errors are never sampled out.
    pub fn record_error(&self, error: impl std::fmt::Display, context: Option<&str>) {
        let label = match context {
            Some(ctx) if !ctx.is_empty() => format!("{ctx}: {error}"),
            _ => error.to_string(),
        };
        {
            let mut state = self.state.lock();
            state.outcomes.push(Sample::now(ERROR, Some(label)));
            state.counters.errors += 1;
        }
        self.evaluate(Check::Outcomes);
    }

    /// Record process resource usage.
    pub fn record_resource_usage(&self, memory_mb: f64, cpu_percent: f64) {
        {
            let mut state = self.state.lock();
            if memory_mb.is_finite() {
                state.memory.push(Sample::now(memory_mb, None));
            }
            if cpu_percent.is_finite() {
                state.cpu.push(Sample::now(cpu_percent, None));
            }
        }
        self.evaluate(Check::Resources);
    }

    /// Record memory usage alone, for callers without a CPU reading.
    pub fn record_memory_usage(&self, memory_mb: f64) {
        if !memory_mb.is_finite() {
            return;
        }
        self.state.lock().memory.push(Sample::now(memory_mb, None));
        self.evaluate(Check::Resources);
    }

    /// Current metrics.
    #[must_use]
    pub fn get_metrics(&self) -> PerformanceMetrics {
        let thresholds = self.config.read().alert_thresholds.clone();
        self.state.lock().metrics(&thresholds)
    }

    /// Evaluate every threshold against the current window and return alerts fired.
    pub fn check_alerts(&self) -> Vec<Alert> {
        self.evaluate(Check::All)
    }

    /// Alerts whose cooldown window is still open.
    #[must_use]
    pub fn get_active_alerts(&self) -> Vec<Alert> {
        self.alerts.lock().active()
    }

    /// Recently fired alerts, oldest first.
    #[must_use]
    pub fn alert_history(&self) -> Vec<Alert> {
        self.alerts.lock().history()
    }

    /// Receive alerts as they fire.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.alerts.lock().subscribe()
    }

    /// Export configuration, counters and windows as a versioned JSON blob.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Snapshot`] if encoding fails.
    pub fn export_data(&self) -> MonitorResult<String> {
        let config = self.config();
        let snapshot = {
            let state = self.state.lock();
            MonitorSnapshot {
                version: SNAPSHOT_VERSION,
                exported_at: Utc::now(),
                config,
                counters: state.counters,
                response_times: state.response_times.to_vec(),
                outcomes: state.outcomes.to_vec(),
                memory: state.memory.to_vec(),
                cpu: state.cpu.to_vec(),
            }
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    /// Replace configuration, counters and windows with an exported snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Snapshot`] for malformed input,
    /// [`MonitorError::UnsupportedVersion`] for another format version and
    /// [`MonitorError::Config`] if the embedded configuration is invalid.
    pub fn import_data(&self, data: &str) -> MonitorResult<()> {
        let snapshot: MonitorSnapshot = serde_json::from_str(data)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(MonitorError::UnsupportedVersion {
                found: snapshot.version,
                supported: SNAPSHOT_VERSION,
            });
        }
        snapshot.config.validate().into_result()?;

        let capacity = snapshot.config.window_size;
        let restored = State {
            response_times: MetricWindow::from_samples(capacity, snapshot.response_times),
            outcomes: MetricWindow::from_samples(capacity, snapshot.outcomes),
            memory: MetricWindow::from_samples(capacity, snapshot.memory),
            cpu: MetricWindow::from_samples(capacity, snapshot.cpu),
            counters: snapshot.counters,
        };

        self.alerts
            .lock()
            .set_cooldown(snapshot.config.alert_cooldown);
        let mut config = self.config.write();
        *self.state.lock() = restored;
        *config = snapshot.config;

        info!(
            exported_at = %snapshot.exported_at,
            "Monitor state imported"
        );
        Ok(())
    }

    /// Drop every sample, counter and alert.
    pub fn reset(&self) {
        let capacity = self.config.read().window_size;
        *self.state.lock() = State::new(capacity);
        self.alerts.lock().clear();
    }

    fn evaluate(&self, check: Check) -> Vec<Alert> {
        let config = self.config.read().clone();
        let thresholds = &config.alert_thresholds;

        let breaches: Vec<(AlertKind, f64, f64)> = {
            let state = self.state.lock();
            let mut breaches = Vec::new();
            let enough_outcomes = state.outcomes.len() >= config.alert_min_samples;
            let enough_latency = state.response_times.len() >= config.alert_min_samples;
            let average = state.response_times.running_mean();
            let error_rate = state.window_error_rate();

            if matches!(check, Check::Latency | Check::All)
                && enough_latency
                && average > thresholds.response_time_ms
            {
                breaches.push((AlertKind::ResponseTime, average, thresholds.response_time_ms));
            }
            if matches!(check, Check::Outcomes | Check::All)
                && enough_outcomes
                && error_rate > thresholds.error_rate
            {
                breaches.push((AlertKind::ErrorRate, error_rate, thresholds.error_rate));
            }
            if matches!(check, Check::Latency | Check::Outcomes | Check::All) && enough_outcomes {
                let score = health_score(error_rate, average, thresholds.response_time_ms);
                if score < thresholds.health_score {
                    breaches.push((AlertKind::HealthScore, score, thresholds.health_score));
                }
            }
            if matches!(check, Check::Resources | Check::All) {
                if let Some(memory) = state.memory.latest().map(|s| s.value) {
                    if memory > thresholds.memory_usage_mb {
                        breaches.push((AlertKind::MemoryUsage, memory, thresholds.memory_usage_mb));
                    }
                }
                if let Some(cpu) = state.cpu.latest().map(|s| s.value) {
                    if cpu > thresholds.cpu_usage_percent {
                        breaches.push((AlertKind::CpuUsage, cpu, thresholds.cpu_usage_percent));
                    }
                }
            }
            breaches
        };

        if breaches.is_empty() {
            return Vec::new();
        }

        let mut alerts = self.alerts.lock();
        breaches
            .into_iter()
            .filter_map(|(kind, value, threshold)| alerts.raise(kind, value, threshold))
            .collect()
    }
}

fn label_of(label: &str) -> Option<String> {
    (!label.is_empty()).then(|| label.to_string())
}

impl Component for PerformanceMonitor {
    fn name(&self) -> &'static str {
        "monitor"
    }

    fn status(&self) -> ComponentStatus {
        let active = self.get_active_alerts();
        if active.is_empty() {
            ComponentStatus::Running
        } else {
            let kinds: Vec<&str> = active.iter().map(|a| a.kind.as_str()).collect();
            ComponentStatus::Degraded {
                reason: format!("active alerts: {}", kinds.join(", ")),
            }
        }
    }

    fn metrics(&self) -> MetricsPayload {
        let metrics = self.get_metrics();
        let (latencies, counters) = {
            let state = self.state.lock();
            (state.response_times.values(), state.counters)
        };
        let (fired, suppressed) = {
            let alerts = self.alerts.lock();
            (alerts.fired(), alerts.suppressed())
        };

        let mut payload = MetricsPayload::new();
        payload.counter("requests", counters.successes + counters.errors);
        payload.counter("errors", counters.errors);
        payload.counter("sampled_out", counters.sampled_out);
        payload.counter("alerts_fired", fired);
        payload.counter("alerts_suppressed", suppressed);
        payload.gauge("requests_per_second", metrics.throughput.requests_per_second);
        payload.gauge("error_rate", metrics.errors.rate);
        payload.gauge("health_score", metrics.health.score);
        payload.histogram("response_time_ms", latencies);
        payload
    }
}
