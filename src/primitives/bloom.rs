//! Bloom filter.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Lowest false-positive rate accepted by [`BloomFilter::new`].
const MIN_FP_RATE: f64 = 1e-9;
/// Highest false-positive rate accepted by [`BloomFilter::new`].
const MAX_FP_RATE: f64 = 0.5;

/// A probabilistic set membership filter.
///
/// `test` never returns `false` for an item that was added. The bit array
/// and hash count are sized with the standard formulas
/// `m = -n ln p / (ln 2)^2` and `k = (m / n) ln 2`, and the `k` probe
/// positions are derived by double hashing. Bits are atomic so the filter can
/// be shared between threads without a lock.
#[derive(Debug)]
pub struct BloomFilter {
    bits: Vec<AtomicU64>,
    num_bits: u64,
    num_hashes: u32,
    expected_items: usize,
    target_fp_rate: f64,
    inserted: AtomicUsize,
}

impl BloomFilter {
    /// Create a filter for `expected_items` at the target false-positive rate.
    ///
    /// `expected_items` is raised to at least one and the rate is clamped to
    /// `[1e-9, 0.5]`.
    #[must_use]
    pub fn new(expected_items: usize, false_positive_rate: f64) -> Self {
        let expected_items = expected_items.max(1);
        let target_fp_rate = if false_positive_rate.is_nan() {
            0.01
        } else {
            false_positive_rate.clamp(MIN_FP_RATE, MAX_FP_RATE)
        };

        let num_bits = optimal_num_bits(expected_items, target_fp_rate);
        let num_hashes = optimal_num_hashes(num_bits, expected_items);
        let words = num_bits.div_ceil(64) as usize;

        let mut bits = Vec::with_capacity(words);
        bits.resize_with(words, || AtomicU64::new(0));

        Self {
            bits,
            num_bits,
            num_hashes,
            expected_items,
            target_fp_rate,
            inserted: AtomicUsize::new(0),
        }
    }

    /// Add an item.
    pub fn add<T: Hash + ?Sized>(&self, item: &T) {
        let (h1, h2) = hash_pair(item);
        for i in 0..u64::from(self.num_hashes) {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            let word = (bit / 64) as usize;
            let mask = 1u64 << (bit % 64);
            self.bits[word].fetch_or(mask, Ordering::Relaxed);
        }
        self.inserted.fetch_add(1, Ordering::Relaxed);
    }

    /// Test whether an item may have been added.
    #[must_use]
    pub fn test<T: Hash + ?Sized>(&self, item: &T) -> bool {
        let (h1, h2) = hash_pair(item);
        (0..u64::from(self.num_hashes)).all(|i| {
            let bit = h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits;
            let word = (bit / 64) as usize;
            let mask = 1u64 << (bit % 64);
            self.bits[word].load(Ordering::Relaxed) & mask != 0
        })
    }

    /// Number of `add` calls since creation or the last clear.
    #[must_use]
    pub fn inserted(&self) -> usize {
        self.inserted.load(Ordering::Relaxed)
    }

    /// Cardinality the filter was sized for.
    #[must_use]
    pub fn expected_items(&self) -> usize {
        self.expected_items
    }

    /// Number of bits in the filter.
    #[must_use]
    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    /// Number of hash probes per item.
    #[must_use]
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Configured false-positive target.
    #[must_use]
    pub fn target_fp_rate(&self) -> f64 {
        self.target_fp_rate
    }

    /// Expected false-positive rate at the current fill: `(1 - e^(-kn/m))^k`.
    #[must_use]
    pub fn estimated_fp_rate(&self) -> f64 {
        let k = f64::from(self.num_hashes);
        let n = self.inserted() as f64;
        let m = self.num_bits as f64;
        (1.0 - (-k * n / m).exp()).powf(k)
    }

    /// Whether more items were added than the filter was sized for.
    #[must_use]
    pub fn is_saturated(&self) -> bool {
        self.inserted() > self.expected_items
    }

    /// Reset every bit.
    pub fn clear(&self) {
        for word in &self.bits {
            word.store(0, Ordering::Relaxed);
        }
        self.inserted.store(0, Ordering::Relaxed);
    }
}

fn optimal_num_bits(n: usize, p: f64) -> u64 {
    let ln2 = std::f64::consts::LN_2;
    let m = -(n as f64) * p.ln() / (ln2 * ln2);
    (m.ceil() as u64).max(64)
}

fn optimal_num_hashes(m: u64, n: usize) -> u32 {
    let k = (m as f64 / n as f64) * std::f64::consts::LN_2;
    (k.round() as u32).clamp(1, 32)
}

fn hash_pair<T: Hash + ?Sized>(item: &T) -> (u64, u64) {
    let mut first = DefaultHasher::new();
    first.write_u8(0x5b);
    item.hash(&mut first);

    let mut second = DefaultHasher::new();
    second.write_u8(0xa7);
    item.hash(&mut second);

    // Odd step so successive probes cycle through distinct bits.
    (first.finish(), second.finish() | 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizing() {
        let filter = BloomFilter::new(1000, 0.01);
        // ~9.59 bits per item and ~7 hashes for 1%.
        assert!(filter.num_bits() >= 9_500 && filter.num_bits() <= 9_700);
        assert_eq!(filter.num_hashes(), 7);
    }

    #[test]
    fn test_no_false_negatives() {
        let filter = BloomFilter::new(5_000, 0.01);
        for i in 0..5_000 {
            filter.add(&format!("key-{i}"));
        }
        for i in 0..5_000 {
            assert!(filter.test(&format!("key-{i}")), "false negative for key-{i}");
        }
        assert_eq!(filter.inserted(), 5_000);
    }

    #[test]
    fn test_false_positive_rate_bounded() {
        let target = 0.01;
        let filter = BloomFilter::new(10_000, target);
        for i in 0..10_000u64 {
            filter.add(&i);
        }

        let false_positives = (1_000_000u64..1_010_000)
            .filter(|i| filter.test(i))
            .count();
        let observed = false_positives as f64 / 10_000.0;
        assert!(
            observed <= target * 2.0,
            "observed fp rate {observed} exceeds 2x target"
        );
    }

    #[test]
    fn test_str_and_string_agree() {
        let filter = BloomFilter::new(10, 0.01);
        filter.add("alpha");
        assert!(filter.test(&"alpha".to_string()));
    }

    #[test]
    fn test_clear_and_saturation() {
        let filter = BloomFilter::new(2, 0.1);
        filter.add(&1);
        filter.add(&2);
        assert!(!filter.is_saturated());
        filter.add(&3);
        assert!(filter.is_saturated());

        filter.clear();
        assert_eq!(filter.inserted(), 0);
        assert!(!filter.test(&1));
    }

    #[test]
    fn test_rate_is_clamped() {
        let filter = BloomFilter::new(100, 2.0);
        assert!((filter.target_fp_rate() - 0.5).abs() < f64::EPSILON);
        let filter = BloomFilter::new(100, f64::NAN);
        assert!((filter.target_fp_rate() - 0.01).abs() < f64::EPSILON);
    }
}
