//! Per-game-type configuration
//!
//! A `SessionCore` bundles the tunables of one pool of rooms: a name
//! for logging, how many may exist at once, the player-count bounds,
//! and the key pool backing room codes. The framework runs two of
//! these in practice, one for lobbies and one for game sessions.

use std::sync::Mutex;

use crate::ids::PoolKey;
use crate::keypool::KeyPool;

#[derive(Debug)]
pub struct SessionCore<K> {
    name: String,
    capacity: usize,
    min_players: usize,
    max_players: usize,
    /// Zero-pad width of rendered key codes, derived from capacity.
    key_width: usize,
    pool: Mutex<KeyPool<K>>,
}

impl<K: PoolKey> SessionCore<K> {
    pub fn new(name: &str, capacity: usize, min_players: usize, max_players: usize) -> Self {
        debug_assert!(min_players >= 1 && min_players <= max_players);
        let key_width = if capacity <= 1 {
            1
        } else {
            (capacity - 1).to_string().len()
        };
        Self {
            name: name.to_string(),
            capacity,
            min_players,
            max_players,
            key_width,
            pool: Mutex::new(KeyPool::new(capacity)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn min_players(&self) -> usize {
        self.min_players
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    /// Lease a key, or `None` when all room codes are in use.
    pub fn lease_key(&self) -> Option<K> {
        self.pool.lock().expect("key pool lock poisoned").try_lease()
    }

    pub fn release_key(&self, key: K) {
        self.pool.lock().expect("key pool lock poisoned").release(key);
    }

    pub fn available_keys(&self) -> usize {
        self.pool.lock().expect("key pool lock poisoned").available()
    }

    /// Render a key as the externally visible zero-padded code.
    pub fn render_key(&self, key: K) -> String {
        format!("{:0width$}", key.index(), width = self.key_width)
    }
}
