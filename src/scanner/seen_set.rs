use std::collections::{HashSet, VecDeque};

/// Unit of deduplication: one listing of one tracked item.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeenKey {
    pub item_slug: String,
    pub listing_id: String,
}

impl SeenKey {
    pub fn new(item_slug: impl Into<String>, listing_id: impl Into<String>) -> Self {
        Self {
            item_slug: item_slug.into(),
            listing_id: listing_id.into(),
        }
    }
}

/// Listings already notified during this run.
///
/// Unbounded by default. With a capacity, the oldest keys are evicted in
/// insertion order once the bound is reached.
#[derive(Debug, Default)]
pub struct SeenSet {
    keys: HashSet<SeenKey>,
    order: VecDeque<SeenKey>,
    capacity: Option<usize>,
}

impl SeenSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bounded(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity.max(1)),
            ..Self::default()
        }
    }

    pub fn has_seen(&self, key: &SeenKey) -> bool {
        self.keys.contains(key)
    }

    /// Records `key`. Returns false if it was already present.
    pub fn mark_seen(&mut self, key: SeenKey) -> bool {
        if self.keys.contains(&key) {
            return false;
        }

        if let Some(capacity) = self.capacity {
            while self.order.len() >= capacity {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.keys.remove(&oldest);
                    }
                    None => break,
                }
            }
        }

        self.order.push_back(key.clone());
        self.keys.insert(key);
        true
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }
}
