//! Test data generators for benchmarks.
//!
//! Keys, payloads, instance definitions and latency samples shaped like the
//! traffic the cache, balancer and monitor see in practice.

use adaptive_perf::modules::load_balancer::InstanceConfig;
use bytes::Bytes;
use rand::RngExt;

/// Namespaced cache keys, `"{prefix}:{i}"`.
pub fn keys(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{prefix}:{i}")).collect()
}

/// Random key indices in `0..universe` following an 80/20 hot-set skew.
pub fn skewed_indices(universe: usize, count: usize) -> Vec<usize> {
    let hot = (universe / 5).max(1);
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            if rng.random_bool(0.8) {
                rng.random_range(0..hot)
            } else {
                rng.random_range(0..universe)
            }
        })
        .collect()
}

/// Random, incompressible payload.
pub fn random_bytes(size: usize) -> Bytes {
    let mut rng = rand::rng();
    Bytes::from((0..size).map(|_| rng.random::<u8>()).collect::<Vec<u8>>())
}

/// Repetitive JSON-like payload that compresses well.
pub fn compressible_bytes(size: usize) -> Bytes {
    let record = br#"{"id":1234,"status":"active","tags":["a","b","c"]},"#;
    Bytes::from(record.iter().copied().cycle().take(size).collect::<Vec<u8>>())
}

/// Instance definitions with weights cycling 1..=5.
pub fn instance_configs(count: usize) -> Vec<InstanceConfig> {
    (0..count)
        .map(|i| {
            InstanceConfig::new(
                format!("node-{i}"),
                format!("tcp://10.0.{}.{}:8080", i / 256, i % 256),
            )
            .with_weight(1 + (i % 5) as u32)
        })
        .collect()
}

/// Latency samples in milliseconds, mostly fast with a slow tail.
pub fn latencies_ms(count: usize) -> Vec<f64> {
    let mut rng = rand::rng();
    (0..count)
        .map(|_| {
            if rng.random_bool(0.95) {
                rng.random_range(1.0..50.0)
            } else {
                rng.random_range(200.0..2_000.0)
            }
        })
        .collect()
}

/// Random integers for search and sort benchmarks.
pub fn random_u64s(count: usize) -> Vec<u64> {
    let mut rng = rand::rng();
    (0..count).map(|_| rng.random_range(0..1_000_000)).collect()
}

/// Text corpus with `needle` appended once at the end.
pub fn haystack(size: usize, needle: &str) -> String {
    let words = ["cache", "warm", "hot", "latency", "instance", "circuit", "probe"];
    let mut rng = rand::rng();
    let mut text = String::with_capacity(size + needle.len());
    while text.len() < size {
        text.push_str(words[rng.random_range(0..words.len())]);
        text.push(' ');
    }
    text.push_str(needle);
    text
}
