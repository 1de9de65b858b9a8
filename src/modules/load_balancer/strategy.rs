//! Load balancing strategies.

use super::config::StrategyType;
use super::instance::Instance;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Trait for load balancing strategies.
///
/// `candidates` holds only eligible instances, in registration order. The
/// strategy returns an index into it, or `None` if it is empty.
pub trait Strategy: Send + Sync {
    /// Pick a candidate.
    fn select(&self, candidates: &[Arc<Instance>]) -> Option<usize>;

    /// Get the strategy name.
    fn name(&self) -> &'static str;
}

/// Round-robin load balancing strategy.
#[derive(Debug, Default)]
pub struct RoundRobinStrategy {
    /// Current index.
    current: AtomicUsize,
}

impl RoundRobinStrategy {
    /// Create a new round-robin strategy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for RoundRobinStrategy {
    fn select(&self, candidates: &[Arc<Instance>]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }
        Some(self.current.fetch_add(1, Ordering::Relaxed) % candidates.len())
    }

    fn name(&self) -> &'static str {
        "round-robin"
    }
}

/// Least connections load balancing strategy.
///
/// Ties go to the earliest registered instance.
#[derive(Debug, Default)]
pub struct LeastConnectionsStrategy;

impl LeastConnectionsStrategy {
    /// Create a new least connections strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for LeastConnectionsStrategy {
    fn select(&self, candidates: &[Arc<Instance>]) -> Option<usize> {
        let mut best: Option<usize> = None;
        let mut min_connections = u32::MAX;

        for (i, instance) in candidates.iter().enumerate() {
            let connections = instance.active_connections();
            if best.is_none() || connections < min_connections {
                min_connections = connections;
                best = Some(i);
            }
        }

        best
    }

    fn name(&self) -> &'static str {
        "least-connections"
    }
}

/// Weighted random strategy: selection probability is proportional to weight.
///
/// When every candidate has weight zero the choice is uniform.
#[derive(Debug, Default)]
pub struct WeightedStrategy;

impl WeightedStrategy {
    /// Create a new weighted strategy.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for WeightedStrategy {
    fn select(&self, candidates: &[Arc<Instance>]) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        let total_weight: u64 = candidates.iter().map(|i| u64::from(i.weight())).sum();
        if total_weight == 0 {
            return Some(rand::RngExt::random_range(
                &mut rand::rng(),
                0..candidates.len(),
            ));
        }

        let target = rand::RngExt::random_range(&mut rand::rng(), 0..total_weight);
        let mut accumulated = 0u64;
        for (i, instance) in candidates.iter().enumerate() {
            accumulated += u64::from(instance.weight());
            if target < accumulated {
                return Some(i);
            }
        }

        Some(candidates.len() - 1)
    }

    fn name(&self) -> &'static str {
        "weighted"
    }
}

/// Closed set of strategies.
#[derive(Debug)]
pub enum StrategyContainer {
    /// Round-robin distribution.
    RoundRobin(RoundRobinStrategy),
    /// Least connections.
    LeastConnections(LeastConnectionsStrategy),
    /// Weighted random.
    Weighted(WeightedStrategy),
}

impl StrategyContainer {
    /// Build the strategy for a configured type.
    #[must_use]
    pub fn from_type(strategy_type: StrategyType) -> Self {
        match strategy_type {
            StrategyType::RoundRobin => Self::RoundRobin(RoundRobinStrategy::new()),
            StrategyType::LeastConnections => {
                Self::LeastConnections(LeastConnectionsStrategy::new())
            },
            StrategyType::Weighted => Self::Weighted(WeightedStrategy::new()),
        }
    }

    /// Get the strategy as a trait object.
    #[must_use]
    pub fn as_strategy(&self) -> &dyn Strategy {
        match self {
            Self::RoundRobin(s) => s,
            Self::LeastConnections(s) => s,
            Self::Weighted(s) => s,
        }
    }

    /// Get strategy name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.as_strategy().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::load_balancer::circuit::CircuitBreakerConfig;
    use crate::modules::load_balancer::config::InstanceConfig;

    fn instances(weights: &[u32]) -> Vec<Arc<Instance>> {
        weights
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                Arc::new(Instance::new(
                    &InstanceConfig::new(format!("i{i}"), format!("http://i{i}")).with_weight(w),
                    100,
                    CircuitBreakerConfig::default(),
                ))
            })
            .collect()
    }

    #[test]
    fn test_round_robin_cycles() {
        let pool = instances(&[1, 1, 1]);
        let strategy = RoundRobinStrategy::new();

        let picks: Vec<usize> = (0..6).filter_map(|_| strategy.select(&pool)).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
        assert_eq!(strategy.select(&[]), None);
    }

    #[test]
    fn test_least_connections_prefers_idle_and_first() {
        let pool = instances(&[1, 1, 1]);
        let strategy = LeastConnectionsStrategy::new();

        // All idle: insertion order wins.
        assert_eq!(strategy.select(&pool), Some(0));

        let _g0 = pool[0].try_admit().unwrap();
        assert_eq!(strategy.select(&pool), Some(1));

        let _g1 = pool[1].try_admit().unwrap();
        let _g2 = pool[2].try_admit().unwrap();
        let _g0b = pool[0].try_admit().unwrap();
        assert_eq!(strategy.select(&pool), Some(1));
    }

    #[test]
    fn test_weighted_distribution() {
        let pool = instances(&[1, 3]);
        let strategy = WeightedStrategy::new();

        let mut counts = [0usize; 2];
        for _ in 0..8_000 {
            counts[strategy.select(&pool).unwrap()] += 1;
        }
        let ratio = counts[1] as f64 / counts[0] as f64;
        assert!((2.5..3.5).contains(&ratio), "ratio {ratio} not near 3");
    }

    #[test]
    fn test_weighted_zero_weight_never_selected() {
        let pool = instances(&[0, 5]);
        let strategy = WeightedStrategy::new();
        for _ in 0..500 {
            assert_eq!(strategy.select(&pool), Some(1));
        }
    }

    #[test]
    fn test_weighted_all_zero_is_uniform() {
        let pool = instances(&[0, 0]);
        let strategy = WeightedStrategy::new();
        let picks: std::collections::HashSet<usize> =
            (0..200).filter_map(|_| strategy.select(&pool)).collect();
        assert_eq!(picks.len(), 2);
    }

    #[test]
    fn test_container_names() {
        assert_eq!(
            StrategyContainer::from_type(StrategyType::RoundRobin).name(),
            "round-robin"
        );
        assert_eq!(
            StrategyContainer::from_type(StrategyType::LeastConnections).name(),
            "least-connections"
        );
        assert_eq!(
            StrategyContainer::from_type(StrategyType::Weighted).name(),
            "weighted"
        );
    }
}
