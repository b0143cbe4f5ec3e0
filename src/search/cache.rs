//! Insertion-ordered cache with a hard capacity and an optional TTL.
//!
//! Lookups never refresh an entry. Re-inserting a key moves it to the
//! freshest position. Every write purges expired entries first and then
//! evicts the oldest insertions until the size is back within capacity.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;

use tokio::time::Instant;

struct Entry<V> {
    value: V,
    seq: u64,
    expires_at: Option<Instant>,
}

pub struct BoundedCache<K, V> {
    capacity: usize,
    ttl: Option<Duration>,
    entries: HashMap<K, Entry<V>>,
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Capacity is clamped to at least one entry.
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        Self {
            capacity: capacity.max(1),
            ttl,
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
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

    /// Value for `key` if present and not yet expired.
    pub fn get(&self, key: &K) -> Option<V> {
        let entry = self.entries.get(key)?;
        match entry.expires_at {
            Some(expires_at) if Instant::now() >= expires_at => None,
            _ => Some(entry.value.clone()),
        }
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: K, value: V) {
        let now = Instant::now();
        self.purge_expired(now);

        if let Some(previous) = self.entries.remove(&key) {
            self.order.remove(&previous.seq);
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(
            key,
            Entry {
                value,
                seq,
                expires_at: self.ttl.map(|ttl| now + ttl),
            },
        );

        while self.entries.len() > self.capacity {
            let Some((_, oldest)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    pub fn remove(&mut self, key: &K) -> Option<V> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry.value)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn purge_expired(&mut self, now: Instant) {
        let expired: Vec<K> = self
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at.is_some_and(|at| now >= at))
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_never_exceeds_capacity() {
        let mut cache = BoundedCache::new(3, None);
        for i in 0..10 {
            cache.insert(i, i * 10);
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.get(&9), Some(90));
        assert_eq!(cache.get(&6), None);
    }

    #[test]
    fn test_evicts_oldest_inserted_first() {
        let mut cache = BoundedCache::new(2, None);
        cache.insert("a", 1);
        cache.insert("b", 2);
        // Reads do not refresh
        assert_eq!(cache.get(&"a"), Some(1));
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.get(&"b"), Some(2));
        assert_eq!(cache.get(&"c"), Some(3));
    }

    #[test]
    fn test_reinsert_moves_key_to_freshest() {
        let mut cache = BoundedCache::new(2, None);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.insert("a", 10);
        cache.insert("c", 3);

        assert_eq!(cache.get(&"a"), Some(10));
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut cache = BoundedCache::new(0, None);
        cache.insert(1, 1);
        assert_eq!(cache.capacity(), 1);
        assert_eq!(cache.get(&1), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let mut cache = BoundedCache::new(10, Some(Duration::from_secs(300)));
        cache.insert("q", vec![1, 2, 3]);

        tokio::time::advance(Duration::from_secs(299)).await;
        assert_eq!(cache.get(&"q"), Some(vec![1, 2, 3]));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&"q"), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_purges_expired_entries() {
        let mut cache = BoundedCache::new(10, Some(Duration::from_secs(5)));
        cache.insert("old", 1);
        tokio::time::advance(Duration::from_secs(6)).await;
        cache.insert("new", 2);

        assert_eq!(cache.len(), 1);
        assert!(!cache.contains_key(&"old"));
    }
}
