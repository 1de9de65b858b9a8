//! # Load Balancer Module
//!
//! Routes operations across a registry of backend instances.
//!
//! ## Features
//!
//! - **Strategies**: round-robin, least-connections (ties by registration
//!   order) and weighted random
//! - **Circuit Breaking**: per-instance breaker with a single half-open probe
//! - **Backpressure**: per-instance connection cap enforced with
//!   compare-and-swap admission
//! - **Health Probes**: optional periodic probing of open circuits
//! - **Draining Shutdown**: in-flight operations finish before instances are
//!   released
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Load Balancer  │
//! │                 │
//! │  ┌───────────┐  │      ┌───────────┐
//! │  │ Strategy  │──┼────▶│ Instance1 │ [circuit]
//! │  │ Selector  │  │      └───────────┘
//! │  └───────────┘  │      ┌───────────┐
//! │        │        │────▶│ Instance2 │ [circuit]
//! │  ┌───────────┐  │      └───────────┘
//! │  │  Health   │  │      ┌───────────┐
//! │  │  Checker  │──┼────▶│ Instance3 │ [circuit]
//! │  └───────────┘  │      └───────────┘
//! └─────────────────┘
//! ```

pub mod balancer;
pub mod circuit;
pub mod config;
pub mod error;
pub mod health;
pub mod instance;
pub mod strategy;

pub use balancer::{LoadBalancer, LoadBalancerStats};
pub use circuit::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use config::{HealthCheckConfig, InstanceConfig, LoadBalancerConfig, StrategyType};
pub use error::{BoxError, LoadBalancerError, LoadBalancerResult};
pub use health::{HealthCheckResult, HealthChecker, HealthProbe, ProbeFuture};
pub use instance::{ConnectionGuard, Instance, InstanceSnapshot};
pub use strategy::{
    LeastConnectionsStrategy, RoundRobinStrategy, Strategy, StrategyContainer, WeightedStrategy,
};
