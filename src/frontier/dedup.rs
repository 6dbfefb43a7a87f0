//! Bounded LRU membership set

use indexmap::IndexSet;

/// Bounded set of URLs recently offered to a frontier
///
/// Front of the set is the least recently used URL. Inserting past capacity
/// evicts from the front.
#[derive(Debug)]
pub struct DedupCache {
    entries: IndexSet<String>,
    capacity: usize,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: IndexSet::with_capacity(capacity),
            capacity,
        }
    }

    /// Returns whether the URL is cached, marking it most recently used
    pub fn contains(&mut self, url: &str) -> bool {
        match self.entries.shift_remove_full(url) {
            Some((_, key)) => {
                self.entries.insert(key);
                true
            }
            None => false,
        }
    }

    /// Inserts a URL as most recently used
    ///
    /// # Returns
    ///
    /// `true` if the URL was not cached before
    pub fn insert(&mut self, url: &str) -> bool {
        if self.contains(url) {
            return false;
        }
        while self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(url.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
