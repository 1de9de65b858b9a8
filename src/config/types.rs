//! Root configuration type.

use crate::manager::ManagerConfig;
use crate::modules::cache::CacheConfig;
use crate::modules::load_balancer::LoadBalancerConfig;
use crate::modules::monitor::MonitorConfig;
use crate::modules::rate_limiting::RateLimitConfig;
use crate::perf::BenchmarkConfig;
use serde::{Deserialize, Serialize};

/// Root configuration, one section per component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerfConfig {
    /// Tiered cache.
    pub cache: CacheConfig,

    /// Load balancer and circuit breakers.
    pub load_balancer: LoadBalancerConfig,

    /// Performance monitor and alerting.
    pub monitor: MonitorConfig,

    /// Benchmark runner.
    pub benchmark: BenchmarkConfig,

    /// Keyed rate limiter.
    pub rate_limit: RateLimitConfig,

    /// Manager maintenance loop.
    pub manager: ManagerConfig,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::load_balancer::StrategyType;
    use std::time::Duration;

    #[test]
    fn test_full_document() {
        let config: PerfConfig = toml::from_str(
            r#"
            [cache]
            l1_max_size = 200
            l2_ttl = "2h"
            compression_enabled = false

            [load_balancer]
            strategy = "least-connections"
            circuit_breaker_threshold = 3
            circuit_breaker_timeout = "10s"
            request_timeout = "2s"

            [load_balancer.health_check]
            enabled = true
            interval = "5s"

            [monitor]
            window_size = 500
            alert_cooldown = "1m"

            [monitor.alert_thresholds]
            error_rate = 0.1

            [benchmark]
            regression_threshold = 0.1
            iterations = 50

            [rate_limit]
            requests_per_second = 20
            burst_size = 40

            [manager]
            optimize_interval = "2m"
        "#,
        )
        .unwrap();

        assert_eq!(config.cache.l1_max_size, 200);
        assert_eq!(config.cache.l2_ttl, Duration::from_secs(7200));
        assert!(!config.cache.compression_enabled);
        assert_eq!(config.load_balancer.strategy, StrategyType::LeastConnections);
        assert_eq!(config.load_balancer.circuit_breaker_threshold, 3);
        assert_eq!(
            config.load_balancer.request_timeout,
            Some(Duration::from_secs(2))
        );
        assert!(config.load_balancer.health_check.enabled);
        assert_eq!(config.monitor.window_size, 500);
        assert_eq!(config.monitor.alert_thresholds.error_rate, 0.1);
        assert_eq!(config.monitor.alert_thresholds.response_time_ms, 1000.0);
        assert_eq!(config.benchmark.iterations, 50);
        assert_eq!(config.rate_limit.burst_size, 40);
        assert_eq!(config.manager.optimize_interval, Duration::from_secs(120));
    }

    #[test]
    fn test_empty_document_is_default() {
        let config: PerfConfig = toml::from_str("").unwrap();
        assert_eq!(config, PerfConfig::default());
    }
}
