//! Binary-heap priority queue with a pluggable comparator.

use std::cmp::Ordering;

/// Comparator over priorities. `Ordering::Less` means "dequeue first".
pub type PriorityCmp<P> = fn(&P, &P) -> Ordering;

#[derive(Debug, Clone)]
struct Slot<T, P> {
    item: T,
    priority: P,
    seq: u64,
}

/// A priority queue backed by a binary heap.
///
/// Items with equal priority are dequeued in insertion order.
#[derive(Debug, Clone)]
pub struct PriorityQueue<T, P> {
    heap: Vec<Slot<T, P>>,
    cmp: PriorityCmp<P>,
    next_seq: u64,
}

impl<T, P: Ord> PriorityQueue<T, P> {
    /// Smallest priority first.
    #[must_use]
    pub fn new_min() -> Self {
        Self::with_comparator(|a: &P, b: &P| a.cmp(b))
    }

    /// Largest priority first.
    #[must_use]
    pub fn new_max() -> Self {
        Self::with_comparator(|a: &P, b: &P| b.cmp(a))
    }
}

impl<T, P> PriorityQueue<T, P> {
    /// Create a queue ordered by `cmp`.
    #[must_use]
    pub fn with_comparator(cmp: PriorityCmp<P>) -> Self {
        Self {
            heap: Vec::new(),
            cmp,
            next_seq: 0,
        }
    }

    /// Add an item.
    pub fn enqueue(&mut self, item: T, priority: P) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Slot {
            item,
            priority,
            seq,
        });
        self.sift_up(self.heap.len() - 1);
    }

    /// Remove the highest-priority item.
    pub fn dequeue(&mut self) -> Option<T> {
        self.dequeue_with_priority().map(|(item, _)| item)
    }

    /// Remove the highest-priority item along with its priority.
    pub fn dequeue_with_priority(&mut self) -> Option<(T, P)> {
        if self.heap.is_empty() {
            return None;
        }
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let slot = self.heap.pop()?;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Some((slot.item, slot.priority))
    }

    /// Peek at the highest-priority item.
    #[must_use]
    pub fn peek(&self) -> Option<&T> {
        self.heap.first().map(|s| &s.item)
    }

    /// Peek at the highest priority.
    #[must_use]
    pub fn peek_priority(&self) -> Option<&P> {
        self.heap.first().map(|s| &s.priority)
    }

    /// Number of queued items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Remove every item.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Drain in priority order.
    pub fn into_sorted_vec(mut self) -> Vec<(T, P)> {
        let mut out = Vec::with_capacity(self.heap.len());
        while let Some(pair) = self.dequeue_with_priority() {
            out.push(pair);
        }
        out
    }

    fn before(&self, a: usize, b: usize) -> bool {
        let (x, y) = (&self.heap[a], &self.heap[b]);
        match (self.cmp)(&x.priority, &y.priority) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => x.seq < y.seq,
        }
    }

    fn sift_up(&mut self, mut idx: usize) {
        while idx > 0 {
            let parent = (idx - 1) / 2;
            if self.before(idx, parent) {
                self.heap.swap(idx, parent);
                idx = parent;
            } else {
                break;
            }
        }
    }

    fn sift_down(&mut self, mut idx: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * idx + 1;
            let right = left + 1;
            let mut best = idx;
            if left < len && self.before(left, best) {
                best = left;
            }
            if right < len && self.before(right, best) {
                best = right;
            }
            if best == idx {
                break;
            }
            self.heap.swap(idx, best);
            idx = best;
        }
    }
}
