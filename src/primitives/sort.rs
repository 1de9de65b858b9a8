//! Introsort and percentile helpers.
//!
//! Quicksort with median-of-three pivots falls back to heapsort once the
//! recursion depth passes `2 * log2(n)`, and to insertion sort on short runs.
//! Worst case stays `O(n log n)`. Not stable.

use std::cmp::Ordering;

const INSERTION_THRESHOLD: usize = 16;

/// Sort in ascending order.
pub fn sort<T: Ord>(data: &mut [T]) {
    sort_by(data, T::cmp);
}

/// Sort with a comparator.
pub fn sort_by<T, F>(data: &mut [T], mut cmp: F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    let len = data.len();
    if len < 2 {
        return;
    }
    let depth_limit = 2 * (usize::BITS - len.leading_zeros()) as usize;
    introsort(data, &mut cmp, depth_limit);
}

/// Sort by a derived key.
pub fn sort_by_key<T, K, F>(data: &mut [T], mut key: F)
where
    K: Ord,
    F: FnMut(&T) -> K,
{
    sort_by(data, |a, b| key(a).cmp(&key(b)));
}

/// Sort floats using IEEE total ordering.
pub fn sort_floats(data: &mut [f64]) {
    sort_by(data, f64::total_cmp);
}

/// Percentile of already-sorted data using linear interpolation.
///
/// `p` is in `[0, 100]` and is clamped. Empty input yields `0.0`.
#[must_use]
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        },
    }
}

/// Percentile of unsorted data. Sorts a copy.
#[must_use]
pub fn percentile(data: &[f64], p: f64) -> f64 {
    let mut copy = data.to_vec();
    sort_floats(&mut copy);
    percentile_sorted(&copy, p)
}

fn introsort<T, F>(mut data: &mut [T], cmp: &mut F, mut depth: usize)
where
    F: FnMut(&T, &T) -> Ordering,
{
    loop {
        let len = data.len();
        if len <= INSERTION_THRESHOLD {
            insertion_sort(data, cmp);
            return;
        }
        if depth == 0 {
            heapsort(data, cmp);
            return;
        }
        depth -= 1;

        let pivot = partition(data, cmp);
        let (left, right) = std::mem::take(&mut data).split_at_mut(pivot);
        let right = &mut right[1..];

        // Recurse into the smaller half, loop on the larger.
        if left.len() < right.len() {
            introsort(left, cmp, depth);
            data = right;
        } else {
            introsort(right, cmp, depth);
            data = left;
        }
    }
}

fn insertion_sort<T, F>(data: &mut [T], cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..data.len() {
        let mut j = i;
        while j > 0 && cmp(&data[j], &data[j - 1]) == Ordering::Less {
            data.swap(j, j - 1);
            j -= 1;
        }
    }
}

/// Lomuto partition around a median-of-three pivot. Returns the pivot's final index.
fn partition<T, F>(data: &mut [T], cmp: &mut F) -> usize
where
    F: FnMut(&T, &T) -> Ordering,
{
    let last = data.len() - 1;
    let mid = last / 2;

    if cmp(&data[mid], &data[0]) == Ordering::Less {
        data.swap(mid, 0);
    }
    if cmp(&data[last], &data[0]) == Ordering::Less {
        data.swap(last, 0);
    }
    if cmp(&data[last], &data[mid]) == Ordering::Less {
        data.swap(last, mid);
    }
    data.swap(mid, last);

    let mut store = 0;
    for i in 0..last {
        if cmp(&data[i], &data[last]) == Ordering::Less {
            data.swap(i, store);
            store += 1;
        }
    }
    data.swap(store, last);
    store
}

fn heapsort<T, F>(data: &mut [T], cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    let len = data.len();
    for start in (0..len / 2).rev() {
        sift_down(data, start, len, cmp);
    }
    for end in (1..len).rev() {
        data.swap(0, end);
        sift_down(data, 0, end, cmp);
    }
}

fn sift_down<T, F>(data: &mut [T], mut root: usize, end: usize, cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    loop {
        let mut child = 2 * root + 1;
        if child >= end {
            return;
        }
        if child + 1 < end && cmp(&data[child], &data[child + 1]) == Ordering::Less {
            child += 1;
        }
        if cmp(&data[root], &data[child]) != Ordering::Less {
            return;
        }
        data.swap(root, child);
        root = child;
    }
}
