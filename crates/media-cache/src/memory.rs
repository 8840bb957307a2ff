//! Bounded in-memory store with strict LRU eviction.
//!
//! Motivation
//! ----------
//! The memory tier is an accelerator in front of the disk tier: if an entry
//! is present it must be usable without touching the file system. Limits
//! are enforced strictly on every insert, both on entry count and on total
//! cost, by evicting the least-recently-used entries until the store is
//! within bounds. Eviction order is deterministic: a monotonic tick is
//! bumped on every access, and the entry with the smallest tick goes first.
//!
//! The store itself is not synchronized. [`crate::cache::MediaCache`] keeps
//! both memory stores behind one lock scoped to the cache instance.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use tracing::trace;

struct StoredEntry<V> {
    value: V,
    cost: u64,
    last_used: u64,
}

/// Keyed store with count and cost limits and LRU eviction.
pub(crate) struct LruStore<K, V> {
    name: &'static str,
    max_entries: usize,
    max_cost: u64,
    map: HashMap<K, StoredEntry<V>>,
    total_cost: u64,
    tick: u64,
}

impl<K, V> LruStore<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    pub(crate) fn new(name: &'static str, max_entries: usize, max_cost: u64) -> Self {
        Self {
            name,
            max_entries,
            max_cost,
            map: HashMap::new(),
            total_cost: 0,
            tick: 0,
        }
    }

    /// Looks up a value and refreshes its recency.
    pub(crate) fn get(&mut self, key: &K) -> Option<V> {
        self.tick += 1;
        let tick = self.tick;
        let entry = self.map.get_mut(key)?;
        entry.last_used = tick;
        Some(entry.value.clone())
    }

    /// Presence check without touching recency.
    pub(crate) fn contains(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Cost of a stored entry without touching recency.
    pub(crate) fn cost_of(&self, key: &K) -> Option<u64> {
        self.map.get(key).map(|e| e.cost)
    }

    /// Inserts a value, then evicts LRU entries until both limits hold.
    ///
    /// A value whose cost alone exceeds the cost limit is not stored; any
    /// stale value under the same key is removed so the store never serves
    /// an outdated payload.
    pub(crate) fn insert(&mut self, key: K, value: V, cost: u64) {
        if self.max_entries == 0 || cost > self.max_cost {
            trace!(
                store = self.name,
                key = ?key,
                cost,
                max_cost = self.max_cost,
                "value too large for memory store, not cached"
            );
            self.remove(&key);
            return;
        }

        self.tick += 1;
        if let Some(old) = self.map.insert(
            key,
            StoredEntry {
                value,
                cost,
                last_used: self.tick,
            },
        ) {
            self.total_cost -= old.cost;
        }
        self.total_cost += cost;

        self.evict_to_limits();
    }

    /// Removes one entry. Returns whether it was present.
    pub(crate) fn remove(&mut self, key: &K) -> bool {
        match self.map.remove(key) {
            Some(entry) => {
                self.total_cost -= entry.cost;
                true
            }
            None => false,
        }
    }

    /// Keeps only the entries whose key satisfies the predicate.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        let total_cost = &mut self.total_cost;
        self.map.retain(|k, e| {
            if keep(k) {
                true
            } else {
                *total_cost -= e.cost;
                false
            }
        });
    }

    pub(crate) fn clear(&mut self) {
        self.map.clear();
        self.total_cost = 0;
    }

    pub(crate) fn len(&self) -> usize {
        self.map.len()
    }

    #[cfg(test)]
    pub(crate) fn total_cost(&self) -> u64 {
        self.total_cost
    }

    fn evict_to_limits(&mut self) {
        while self.map.len() > self.max_entries || self.total_cost > self.max_cost {
            let oldest = self
                .map
                .iter()
                .min_by_key(|(_, e)| e.last_used)
                .map(|(k, _)| k.clone());
            let Some(key) = oldest else { break };

            if let Some(entry) = self.map.remove(&key) {
                self.total_cost -= entry.cost;
                trace!(
                    store = self.name,
                    key = ?key,
                    cost = entry.cost,
                    "evicted least recently used entry"
                );
            }
        }
    }
}
