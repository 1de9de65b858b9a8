//! Memory-efficient building blocks.
//!
//! - [`RingBuffer`]: fixed-capacity FIFO that overwrites its oldest item
//! - [`LruMap`]: bounded map with O(1) least-recently-used eviction
//! - [`BloomFilter`]: probabilistic membership with no false negatives
//! - [`PriorityQueue`]: binary heap with a pluggable comparator
//! - [`sort`]: introsort plus percentile helpers
//! - [`search`]: binary, interpolation and Boyer-Moore search

mod bloom;
mod lru_map;
mod priority_queue;
mod ring_buffer;
pub mod search;
pub mod sort;

pub use bloom::BloomFilter;
pub use lru_map::{LruIter, LruMap};
pub use priority_queue::{PriorityCmp, PriorityQueue};
pub use ring_buffer::RingBuffer;
pub use search::BoyerMoore;
