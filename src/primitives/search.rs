//! Searching sorted arrays and text.

use std::cmp::Ordering;

/// Binary search on sorted data. Returns the index of a matching element.
#[must_use]
pub fn binary_search<T: Ord>(sorted: &[T], target: &T) -> Option<usize> {
    binary_search_by(sorted, |probe| probe.cmp(target))
}

/// Binary search with a probe comparator (`probe.cmp(target)`).
pub fn binary_search_by<T, F>(sorted: &[T], mut cmp: F) -> Option<usize>
where
    F: FnMut(&T) -> Ordering,
{
    let mut lo = 0usize;
    let mut hi = sorted.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        match cmp(&sorted[mid]) {
            Ordering::Less => lo = mid + 1,
            Ordering::Greater => hi = mid,
            Ordering::Equal => return Some(mid),
        }
    }
    None
}

/// First index whose element is not less than `target`.
#[must_use]
pub fn lower_bound<T: Ord>(sorted: &[T], target: &T) -> usize {
    let mut lo = 0usize;
    let mut hi = sorted.len();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if sorted[mid] < *target {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Keys that can be linearly interpolated.
pub trait NumericKey: Copy + PartialOrd {
    /// Position of the key on a real line.
    fn as_f64(self) -> f64;
}

impl NumericKey for i64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl NumericKey for u64 {
    fn as_f64(self) -> f64 {
        self as f64
    }
}

impl NumericKey for i32 {
    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

impl NumericKey for u32 {
    fn as_f64(self) -> f64 {
        f64::from(self)
    }
}

impl NumericKey for f64 {
    fn as_f64(self) -> f64 {
        self
    }
}

/// Interpolation search over sorted numeric keys.
///
/// Averages `O(log log n)` on uniformly distributed keys. Falls back to
/// bisection of the remaining range when the keys at both ends are equal or
/// the interpolated probe is not finite.
#[must_use]
pub fn interpolation_search<T: NumericKey>(sorted: &[T], target: T) -> Option<usize> {
    if sorted.is_empty() {
        return None;
    }

    let mut lo = 0usize;
    let mut hi = sorted.len() - 1;

    while lo <= hi && target >= sorted[lo] && target <= sorted[hi] {
        let lo_val = sorted[lo].as_f64();
        let hi_val = sorted[hi].as_f64();

        let pos = if hi_val > lo_val {
            let ratio = (target.as_f64() - lo_val) / (hi_val - lo_val);
            let estimate = lo as f64 + ratio * (hi - lo) as f64;
            if estimate.is_finite() {
                (estimate as usize).clamp(lo, hi)
            } else {
                lo + (hi - lo) / 2
            }
        } else {
            lo + (hi - lo) / 2
        };

        match sorted[pos].partial_cmp(&target) {
            Some(Ordering::Equal) => return Some(pos),
            Some(Ordering::Less) => lo = pos + 1,
            Some(Ordering::Greater) => {
                if pos == 0 {
                    return None;
                }
                hi = pos - 1;
            },
            None => return None,
        }
    }
    None
}

/// Boyer-Moore substring matcher with bad-character and good-suffix rules.
#[derive(Debug, Clone)]
pub struct BoyerMoore {
    pattern: Vec<u8>,
    bad_char: [isize; 256],
    good_suffix: Vec<usize>,
}

impl BoyerMoore {
    /// Preprocess a pattern.
    #[must_use]
    pub fn new(pattern: impl AsRef<[u8]>) -> Self {
        let pattern = pattern.as_ref().to_vec();
        let bad_char = build_bad_char(&pattern);
        let good_suffix = build_good_suffix(&pattern);
        Self {
            pattern,
            bad_char,
            good_suffix,
        }
    }

    /// The pattern bytes.
    #[must_use]
    pub fn pattern(&self) -> &[u8] {
        &self.pattern
    }

    /// Offset of the first match. An empty pattern matches at 0.
    #[must_use]
    pub fn find(&self, text: impl AsRef<[u8]>) -> Option<usize> {
        if self.pattern.is_empty() {
            return Some(0);
        }
        self.find_from(text.as_ref(), 0)
    }

    /// Whether the pattern occurs in `text`.
    #[must_use]
    pub fn is_match(&self, text: impl AsRef<[u8]>) -> bool {
        self.find(text).is_some()
    }

    /// Offsets of every (possibly overlapping) match. An empty pattern yields none.
    #[must_use]
    pub fn find_all(&self, text: impl AsRef<[u8]>) -> Vec<usize> {
        let text = text.as_ref();
        let mut out = Vec::new();
        if self.pattern.is_empty() {
            return out;
        }
        let mut start = 0;
        while let Some(pos) = self.find_from(text, start) {
            out.push(pos);
            start = pos + 1;
        }
        out
    }

    fn find_from(&self, text: &[u8], start: usize) -> Option<usize> {
        let m = self.pattern.len();
        let n = text.len();
        if m > n {
            return None;
        }

        let mut shift = start;
        while shift + m <= n {
            let mut j = m;
            while j > 0 && self.pattern[j - 1] == text[shift + j - 1] {
                j -= 1;
            }
            if j == 0 {
                return Some(shift);
            }

            let mismatched = text[shift + j - 1];
            let bc = (j as isize - 1) - self.bad_char[mismatched as usize];
            let gs = self.good_suffix[j];
            shift += (bc.max(1) as usize).max(gs);
        }
        None
    }
}

fn build_bad_char(pattern: &[u8]) -> [isize; 256] {
    let mut table = [-1isize; 256];
    for (i, &b) in pattern.iter().enumerate() {
        table[b as usize] = i as isize;
    }
    table
}

/// `shift[j]` is the safe shift when the mismatch happens at `pattern[j - 1]`,
/// i.e. `pattern[j..]` matched.
fn build_good_suffix(pattern: &[u8]) -> Vec<usize> {
    let m = pattern.len();
    let mut shift = vec![0usize; m + 1];
    if m == 0 {
        return shift;
    }
    let mut border = vec![0usize; m + 1];

    // Strong good-suffix rule.
    let mut i = m;
    let mut j = m + 1;
    border[i] = j;
    while i > 0 {
        while j <= m && pattern[i - 1] != pattern[j - 1] {
            if shift[j] == 0 {
                shift[j] = j - i;
            }
            j = border[j];
        }
        i -= 1;
        j -= 1;
        border[i] = j;
    }

    // Suffix only partially occurs as a prefix.
    let mut j = border[0];
    for i in 0..=m {
        if shift[i] == 0 {
            shift[i] = j;
        }
        if i == j {
            j = border[j];
        }
    }

    shift
}
