use std::collections::HashSet;
use std::collections::VecDeque;

/// Ordered set of distinct keys awaiting consumption.
///
/// Insertion order is notification order. Re-marking a key that is already
/// pending is O(1) and leaves both its position and the queue length
/// unchanged, so N writes to one key cost one pending entry.
#[derive(Debug, Default, Clone)]
pub struct DirtyKeySet {
    order: VecDeque<String>,
    pending: HashSet<String>,
}

impl DirtyKeySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `key` dirty. Returns `true` if it was not already pending.
    pub fn mark(
        &mut self,
        key: &str,
    ) -> bool {
        if self.pending.contains(key) {
            return false;
        }
        self.pending.insert(key.to_string());
        self.order.push_back(key.to_string());
        true
    }

    /// Removes the oldest pending key and clears its mark.
    pub fn pop(&mut self) -> Option<String> {
        let key = self.order.pop_front()?;
        self.pending.remove(&key);
        Some(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
