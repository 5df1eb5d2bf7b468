//! Fixed-capacity FIFO over recent items.
//!
//! Backs the provenance domain's recent-events view. Eviction of the oldest
//! item on overflow is expected steady-state behavior, not an error; the
//! durable record lives in the chain log, this is a volatile view only.

use std::collections::VecDeque;

/// Ring buffer holding at most `capacity` most-recently-appended items.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append one item, silently dropping the oldest when at capacity.
    pub fn append(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.items.len() == self.capacity {
            self.items.pop_front();
        }
        self.items.push_back(item);
    }

    /// Up to the `n` most recently appended items, oldest first.
    pub fn recent(&self, n: usize) -> Vec<&T> {
        let skip = self.items.len().saturating_sub(n);
        self.items.iter().skip(skip).collect()
    }

    /// All held items, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.items.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Empty the buffer. Has no effect on any durable log.
    pub fn clear(&mut self) {
        self.items.clear();
    }
}
