//! Thread-safe registry of active lobbies/sessions
//!
//! The registries holding the collections are the only structures
//! needing cross-request mutual exclusion: lookups and enumeration
//! take the read lock, structural add/remove takes the write lock.
//! Each held item is independently mutable behind its own lock.

use std::sync::{Arc, RwLock};

#[derive(Debug)]
pub struct ConcurrentRegistry<T> {
    items: RwLock<Vec<Arc<T>>>,
}

impl<T> ConcurrentRegistry<T> {
    pub fn new() -> Self {
        Self {
            items: RwLock::new(Vec::new()),
        }
    }

    pub fn insert(&self, item: Arc<T>) {
        self.items.write().expect("registry lock poisoned").push(item);
    }

    /// First item matching the predicate, cloned out under the read lock.
    pub fn find<P>(&self, pred: P) -> Option<Arc<T>>
    where
        P: Fn(&T) -> bool,
    {
        self.items
            .read()
            .expect("registry lock poisoned")
            .iter()
            .find(|item| pred(item))
            .cloned()
    }

    /// Remove the first item matching the predicate, returning it.
    pub fn remove<P>(&self, pred: P) -> Option<Arc<T>>
    where
        P: Fn(&T) -> bool,
    {
        let mut items = self.items.write().expect("registry lock poisoned");
        let pos = items.iter().position(|item| pred(item))?;
        Some(items.swap_remove(pos))
    }

    /// Snapshot of the current contents for enumeration outside the lock.
    pub fn snapshot(&self) -> Vec<Arc<T>> {
        self.items.read().expect("registry lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.items.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for ConcurrentRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
