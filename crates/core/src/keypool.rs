//! Bounded pool of reusable identifier keys
//!
//! A key is either free (in the pool) or leased (held by exactly one
//! live lobby/session). An empty pool is the only way creation fails
//! for capacity reasons. No ordering guarantee on which key a lease
//! returns.

use crate::ids::PoolKey;

#[derive(Debug)]
pub struct KeyPool<K> {
    free: Vec<K>,
    capacity: usize,
}

impl<K: PoolKey> KeyPool<K> {
    /// Create a pool holding keys `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity as u32).map(K::from_index).collect();
        Self { free, capacity }
    }

    /// Remove and return an arbitrary free key, or `None` if the
    /// capacity is exhausted.
    pub fn try_lease(&mut self) -> Option<K> {
        self.free.pop()
    }

    /// Return a leased key to the pool.
    ///
    /// The caller guarantees no double release; a duplicate or foreign
    /// key trips a debug assertion.
    pub fn release(&mut self, key: K) {
        debug_assert!(
            !self.free.iter().any(|k| *k == key),
            "key {} released twice",
            key.index()
        );
        debug_assert!(
            (key.index() as usize) < self.capacity,
            "key {} does not belong to this pool",
            key.index()
        );
        if self.free.len() < self.capacity {
            self.free.push(key);
        }
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_exhausted(&self) -> bool {
        self.free.is_empty()
    }
}
