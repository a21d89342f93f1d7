//! Bounded most-recent-first log.

use std::collections::VecDeque;

/// Append-only log ordered by arrival, newest first, with a hard capacity.
///
/// Pushing beyond capacity evicts the oldest entry. This is a backpressure
/// policy to bound memory under sustained load, not a protocol requirement.
#[derive(Debug, Clone)]
pub struct BoundedLog<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    /// Insert at the front; evicts the oldest entry when full.
    pub fn push(&mut self, item: T) {
        self.items.push_front(item);
        if self.items.len() > self.capacity {
            self.items.pop_back();
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Most recent entry.
    pub fn latest(&self) -> Option<&T> {
        self.items.front()
    }

    /// Oldest retained entry.
    pub fn oldest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Newest-to-oldest iteration.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.items.iter_mut()
    }
}
