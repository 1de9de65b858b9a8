//! Heap accounting for benchmarks.
//!
//! [`TrackingAllocator`] wraps the system allocator and keeps process-wide
//! counters of live bytes and allocation calls. Install it in a binary with
//!
//! ```ignore
//! #[global_allocator]
//! static GLOBAL: adaptive_perf::perf::TrackingAllocator = adaptive_perf::perf::TrackingAllocator;
//! ```
//!
//! Without it the counters stay at zero and benchmark heap deltas read 0.

#![allow(unsafe_code)]

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

static ALLOCATED: AtomicU64 = AtomicU64::new(0);
static DEALLOCATED: AtomicU64 = AtomicU64::new(0);
static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static ACTIVE: AtomicBool = AtomicBool::new(false);

/// Counting wrapper around [`System`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TrackingAllocator;

// Safety: every call is forwarded unchanged to `System`; the counters are
// plain atomics and never allocate.
unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        // Safety: same contract as the caller's.
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        // Safety: same contract as the caller's.
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // Safety: same contract as the caller's.
        unsafe { System.dealloc(ptr, layout) };
        DEALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        // Safety: same contract as the caller's.
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            DEALLOCATED.fetch_add(layout.size() as u64, Ordering::Relaxed);
            record_alloc(new_size);
        }
        new_ptr
    }
}

#[inline]
fn record_alloc(size: usize) {
    ACTIVE.store(true, Ordering::Relaxed);
    ALLOCATED.fetch_add(size as u64, Ordering::Relaxed);
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
}

impl TrackingAllocator {
    /// Whether the allocator has seen any allocation, i.e. is installed.
    #[must_use]
    pub fn is_active() -> bool {
        ACTIVE.load(Ordering::Relaxed)
    }

    /// Point-in-time heap counters.
    #[must_use]
    pub fn snapshot() -> HeapSnapshot {
        HeapSnapshot {
            allocated: ALLOCATED.load(Ordering::Relaxed),
            deallocated: DEALLOCATED.load(Ordering::Relaxed),
            allocations: ALLOCATIONS.load(Ordering::Relaxed),
        }
    }
}

/// Heap counters at one instant.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapSnapshot {
    /// Bytes ever allocated.
    pub allocated: u64,
    /// Bytes ever freed.
    pub deallocated: u64,
    /// Allocation calls.
    pub allocations: u64,
}

impl HeapSnapshot {
    /// Bytes currently live.
    #[must_use]
    pub fn live_bytes(&self) -> i64 {
        self.allocated as i64 - self.deallocated as i64
    }

    /// Change in live bytes since `earlier`.
    #[must_use]
    pub fn delta_since(&self, earlier: &HeapSnapshot) -> i64 {
        self.live_bytes() - earlier.live_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delta_since() {
        let before = HeapSnapshot {
            allocated: 1000,
            deallocated: 200,
            allocations: 4,
        };
        let after = HeapSnapshot {
            allocated: 1500,
            deallocated: 900,
            allocations: 6,
        };
        assert_eq!(before.live_bytes(), 800);
        assert_eq!(after.delta_since(&before), -200);
    }

    #[test]
    fn test_forwarding_allocations() {
        let allocator = TrackingAllocator;
        let layout = Layout::from_size_align(64, 8).unwrap();
        let before = TrackingAllocator::snapshot();

        // Safety: layout is non-zero sized and the pointer is freed with the same layout.
        unsafe {
            let ptr = allocator.alloc(layout);
            assert!(!ptr.is_null());
            allocator.dealloc(ptr, layout);
        }

        let after = TrackingAllocator::snapshot();
        assert!(after.allocations > before.allocations);
        assert!(after.allocated >= before.allocated + 64);
        assert!(TrackingAllocator::is_active());
    }
}
