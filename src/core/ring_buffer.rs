//! Bounded, insertion-ordered storage for sealed snapshots.
//!
//! # Design Decisions
//! - Capacity-driven eviction only; entries never expire by age
//! - Re-pushing an existing id overwrites in place and keeps its position
//! - Snapshots are stored behind `Arc` so list reads do not deep-copy

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::types::RequestSnapshot;

/// Storage backend for sealed request snapshots.
pub trait RequestStorage: Send + Sync {
    /// Insert or overwrite `id`. Returns the id evicted to make room, if any.
    fn push(&mut self, id: String, snapshot: RequestSnapshot) -> Option<String>;

    fn get(&self, id: &str) -> Option<Arc<RequestSnapshot>>;

    /// Up to `limit` most recently inserted snapshots, newest first.
    fn get_all(&self, limit: usize) -> Vec<Arc<RequestSnapshot>>;

    fn latest(&self) -> Option<Arc<RequestSnapshot>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }
}

/// In-memory FIFO ring buffer keyed by request id.
#[derive(Debug)]
pub struct RequestRingBuffer {
    entries: HashMap<String, Arc<RequestSnapshot>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RequestRingBuffer {
    /// Create a buffer holding at most `capacity` snapshots (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Ids in insertion order, oldest first.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl Default for RequestRingBuffer {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RequestStorage for RequestRingBuffer {
    fn push(&mut self, id: String, snapshot: RequestSnapshot) -> Option<String> {
        if let Some(slot) = self.entries.get_mut(&id) {
            *slot = Arc::new(snapshot);
            return None;
        }

        let mut evicted = None;
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.entries.remove(&oldest);
                    evicted = Some(oldest);
                }
                None => break,
            }
        }

        self.order.push_back(id.clone());
        self.entries.insert(id, Arc::new(snapshot));
        evicted
    }

    fn get(&self, id: &str) -> Option<Arc<RequestSnapshot>> {
        self.entries.get(id).cloned()
    }

    fn get_all(&self, limit: usize) -> Vec<Arc<RequestSnapshot>> {
        self.order
            .iter()
            .rev()
            .take(limit)
            .filter_map(|id| self.entries.get(id).cloned())
            .collect()
    }

    fn latest(&self) -> Option<Arc<RequestSnapshot>> {
        self.order.back().and_then(|id| self.entries.get(id).cloned())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
