use std::collections::HashSet;
use std::hash::Hash;

/// Keys of work items that completed in some run.
///
/// There is no removal: once a key is marked it stays marked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSet<K: Eq + Hash> {
    done: HashSet<K>,
}

impl<K: Eq + Hash> Default for CheckpointSet<K> {
    fn default() -> Self {
        Self {
            done: HashSet::new(),
        }
    }
}

impl<K: Eq + Hash> CheckpointSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self, key: &K) -> bool {
        self.done.contains(key)
    }

    /// Returns `true` when the key was not marked before.
    pub fn mark_done(&mut self, key: K) -> bool {
        self.done.insert(key)
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.done.iter()
    }
}

impl<K: Eq + Hash> FromIterator<K> for CheckpointSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self {
            done: iter.into_iter().collect(),
        }
    }
}

impl<K: Eq + Hash> Extend<K> for CheckpointSet<K> {
    fn extend<I: IntoIterator<Item = K>>(&mut self, iter: I) {
        self.done.extend(iter);
    }
}
