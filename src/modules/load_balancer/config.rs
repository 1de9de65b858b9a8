//! Load balancer configuration types.

use crate::config::{ValidationError, ValidationResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the load balancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    /// Instance selection strategy.
    pub strategy: StrategyType,

    /// Consecutive failures within `failure_window` that open a circuit.
    pub circuit_breaker_threshold: u32,

    /// How long a circuit stays open before a probe is allowed.
    #[serde(with = "humantime_serde")]
    pub circuit_breaker_timeout: Duration,

    /// A failure further than this from the previous one restarts the count.
    #[serde(with = "humantime_serde")]
    pub failure_window: Duration,

    /// Default per-instance connection cap.
    pub max_connections: u32,

    /// Timeout applied to every routed operation.
    #[serde(default, with = "humantime_serde")]
    pub request_timeout: Option<Duration>,

    /// Maximum time `shutdown()` waits for in-flight operations.
    #[serde(with = "humantime_serde")]
    pub drain_timeout: Duration,

    /// Periodic probing of open circuits.
    pub health_check: HealthCheckConfig,

    /// Instances registered at construction.
    pub instances: Vec<InstanceConfig>,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyType::default(),
            circuit_breaker_threshold: 5,
            circuit_breaker_timeout: Duration::from_secs(30),
            failure_window: Duration::from_secs(60),
            max_connections: 100,
            request_timeout: None,
            drain_timeout: Duration::from_secs(30),
            health_check: HealthCheckConfig::default(),
            instances: Vec::new(),
        }
    }
}

impl LoadBalancerConfig {
    /// Check ranges and instance definitions.
    #[must_use]
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::new();

        if self.circuit_breaker_threshold == 0 {
            result.add_error(ValidationError::error(
                "load_balancer.circuit_breaker_threshold",
                "must be at least 1",
            ));
        }
        if self.circuit_breaker_timeout.is_zero() {
            result.add_error(ValidationError::error(
                "load_balancer.circuit_breaker_timeout",
                "must be positive",
            ));
        }
        if self.failure_window.is_zero() {
            result.add_error(ValidationError::error(
                "load_balancer.failure_window",
                "must be positive",
            ));
        }
        if self.max_connections == 0 {
            result.add_error(ValidationError::error(
                "load_balancer.max_connections",
                "must be at least 1",
            ));
        }
        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            result.add_error(ValidationError::error(
                "load_balancer.request_timeout",
                "must be positive when set",
            ));
        }
        if self.health_check.enabled && self.health_check.interval.is_zero() {
            result.add_error(ValidationError::error(
                "load_balancer.health_check.interval",
                "must be positive",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for instance in &self.instances {
            if instance.id.is_empty() {
                result.add_error(ValidationError::error(
                    "load_balancer.instances[].id",
                    "instance id cannot be empty",
                ));
            }
            if !seen.insert(instance.id.as_str()) {
                result.add_error(ValidationError::error(
                    format!("load_balancer.instances.{}", instance.id),
                    format!("duplicate instance id: {}", instance.id),
                ));
            }
            if instance.max_connections == Some(0) {
                result.add_error(ValidationError::error(
                    format!("load_balancer.instances.{}.max_connections", instance.id),
                    "must be at least 1",
                ));
            }
            if instance.weight == 0 && self.strategy == StrategyType::Weighted {
                result.add_error(ValidationError::warning(
                    format!("load_balancer.instances.{}.weight", instance.id),
                    "zero weight; instance will never be selected",
                ));
            }
        }

        result
    }
}

/// Definition of a single backend instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceConfig {
    /// Unique instance id.
    pub id: String,

    /// Opaque endpoint (URL, address, queue name).
    pub endpoint: String,

    /// Relative weight for the weighted strategy.
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Connection cap overriding the balancer default.
    #[serde(default)]
    pub max_connections: Option<u32>,
}

impl InstanceConfig {
    /// Create an instance definition with weight 1.
    pub fn new(id: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            endpoint: endpoint.into(),
            weight: default_weight(),
            max_connections: None,
        }
    }

    /// Set the weight.
    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Set the connection cap.
    #[must_use]
    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }
}

/// Load balancing strategy types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyType {
    /// Round-robin distribution.
    #[default]
    RoundRobin,
    /// Fewest active connections, ties broken by insertion order.
    LeastConnections,
    /// Random selection proportional to weight.
    Weighted,
}

impl StrategyType {
    /// Kebab-case name as used in configuration.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round-robin",
            Self::LeastConnections => "least-connections",
            Self::Weighted => "weighted",
        }
    }
}

impl std::fmt::Display for StrategyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StrategyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round-robin" | "round_robin" => Ok(Self::RoundRobin),
            "least-connections" | "least_connections" => Ok(Self::LeastConnections),
            "weighted" => Ok(Self::Weighted),
            other => Err(format!(
                "unknown strategy '{other}', expected round-robin, least-connections or weighted"
            )),
        }
    }
}

/// Health check configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable health checks.
    pub enabled: bool,

    /// Health check interval.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,

    /// Timeout for a single probe.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: Duration::from_secs(10),
            timeout: Duration::from_secs(5),
        }
    }
}

fn default_weight() -> u32 {
    1
}
