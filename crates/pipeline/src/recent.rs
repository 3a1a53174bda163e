//! Bounded memory of keys the assembler has already emitted.

use std::{
    collections::{HashSet, VecDeque},
    hash::Hash,
};

/// Insertion-ordered set that forgets its oldest keys past `capacity`.
///
/// The newest key is always kept, so a capacity of zero behaves like one.
#[derive(Debug)]
pub(crate) struct RecentKeys<K> {
    capacity: usize,
    order: VecDeque<K>,
    members: HashSet<K>,
}

impl<K: Eq + Hash + Clone> RecentKeys<K> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            order: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    pub(crate) fn contains(&self, key: &K) -> bool {
        self.members.contains(key)
    }

    /// Returns `false` if the key was already remembered.
    pub(crate) fn insert(&mut self, key: K) -> bool {
        if !self.members.insert(key.clone()) {
            return false;
        }
        self.order.push_back(key);
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.members.remove(&oldest);
            }
        }
        true
    }
}
