//! Bounded window of recently delivered event identifiers
//!
//! Prevents re-delivery of events re-fetched after a resumed poll. The
//! window is capacity-limited with oldest-first eviction: an identifier
//! evicted before a late duplicate arrives will be delivered again, which
//! is the accepted cost of bounded memory. Single writer (the poll loop).

use std::collections::{HashSet, VecDeque};

/// Insertion-ordered set of recently seen identifiers
#[derive(Debug)]
pub struct DedupWindow {
    capacity: usize,
    order: VecDeque<String>,
    seen: HashSet<String>,
}

impl DedupWindow {
    /// Create a window holding at most `capacity` identifiers. A capacity
    /// of zero disables deduplication entirely.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
        }
    }

    /// Record an identifier. Returns `false` when it is already resident,
    /// meaning the event was delivered before and must be skipped.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.capacity == 0 {
            return true;
        }
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() == self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.seen.remove(&oldest);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }

    /// Whether an identifier is currently resident.
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    /// Number of identifiers currently resident.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
