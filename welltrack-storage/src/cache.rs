//! Fixed-capacity least-recently-used cache.
//!
//! Recency is a monotonically increasing tick; `order` maps tick → key so the
//! oldest entry is always the first key of the BTreeMap.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

/// Bounded cache that evicts the least recently used entry when full.
#[derive(Debug)]
pub struct LruCache<K, V> {
    capacity: usize,
    tick: u64,
    entries: HashMap<K, (V, u64)>,
    order: BTreeMap<u64, K>,
}

impl<K: Hash + Eq + Clone, V: Clone> LruCache<K, V> {
    /// Creates a cache holding at most `capacity` entries. A capacity of zero
    /// disables caching.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            entries: HashMap::with_capacity(capacity),
            order: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns a clone of the cached value and marks it most recently used.
    pub fn get(&mut self, key: &K) -> Option<V> {
        let next = self.next_tick();
        let (value, last_used) = self.entries.get_mut(key)?;
        self.order.remove(&*last_used);
        *last_used = next;
        self.order.insert(next, key.clone());
        Some(value.clone())
    }

    /// Inserts or replaces `key`, evicting the least recently used entry if
    /// the cache is full. Returns the evicted key, if any.
    pub fn put(&mut self, key: K, value: V) -> Option<K> {
        if self.capacity == 0 {
            return None;
        }

        let next = self.next_tick();
        if let Some((_, old_tick)) = self.entries.insert(key.clone(), (value, next)) {
            self.order.remove(&old_tick);
            self.order.insert(next, key);
            return None;
        }
        self.order.insert(next, key);

        if self.entries.len() > self.capacity {
            if let Some((_, oldest)) = self.order.pop_first() {
                self.entries.remove(&oldest);
                return Some(oldest);
            }
        }
        None
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let (value, tick) = self.entries.remove(key)?;
        self.order.remove(&tick);
        Some(value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}
