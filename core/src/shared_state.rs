//! Bounded key/value region visible to every task of a plan.
//!
//! Entries are kept in insertion order; once the entry count exceeds the
//! configured capacity the oldest-inserted entries are dropped. Overwriting an
//! existing key updates its value in place and keeps its original position.

use std::sync::{Arc, Mutex, MutexGuard};

use indexmap::IndexMap;
use serde_json::Value;

#[derive(Clone)]
pub struct SharedState {
    inner: Arc<Mutex<SharedStateInner>>,
}

struct SharedStateInner {
    entries: IndexMap<String, Value>,
    capacity: usize,
    evicted: u64,
}

impl SharedStateInner {
    fn insert(&mut self, key: String, value: Value) {
        self.entries.insert(key, value);
        self.enforce_capacity();
    }

    fn enforce_capacity(&mut self) {
        let overflow = self.entries.len().saturating_sub(self.capacity);
        if overflow > 0 {
            self.entries.drain(..overflow);
            self.evicted += overflow as u64;
        }
    }
}

impl SharedState {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SharedStateInner {
                entries: IndexMap::new(),
                capacity,
                evicted: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SharedStateInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().entries.get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Insert or overwrite `key`, evicting the oldest entries if the store overflows.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.lock().insert(key.into(), value);
    }

    /// Apply a batch of writes under one lock so concurrent writers never interleave
    /// with a partially applied batch.
    pub fn merge<I, K>(&self, entries: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let mut inner = self.lock();
        for (key, value) in entries {
            inner.entries.insert(key.into(), value);
        }
        inner.enforce_capacity();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    /// Total number of entries dropped by eviction since creation or the last `clear`.
    pub fn evicted(&self) -> u64 {
        self.lock().evicted
    }

    /// Ordered copy of the current entries, oldest first.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.lock().entries.clone()
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.evicted = 0;
    }
}

impl std::fmt::Debug for SharedState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SharedState")
            .field("len", &inner.entries.len())
            .field("capacity", &inner.capacity)
            .field("evicted", &inner.evicted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn evicts_oldest_inserted_first() {
        let store = SharedState::new(3);
        for i in 0..5 {
            store.set(format!("k{i}"), json!(i));
        }
        assert_eq!(store.len(), 3);
        assert_eq!(store.get("k0"), None);
        assert_eq!(store.get("k1"), None);
        let keys: Vec<_> = store.snapshot().keys().cloned().collect();
        assert_eq!(keys, vec!["k2", "k3", "k4"]);
        assert_eq!(store.evicted(), 2);
    }

    #[test]
    fn overwrite_keeps_insertion_position() {
        let store = SharedState::new(2);
        store.set("a", json!(1));
        store.set("b", json!(2));
        // Reading or rewriting "a" does not refresh it.
        store.get("a");
        store.set("a", json!(10));
        store.set("c", json!(3));
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), Some(json!(2)));
        assert_eq!(store.get("c"), Some(json!(3)));
    }

    #[test]
    fn merge_applies_batch_then_trims() {
        let store = SharedState::new(2);
        store.merge(vec![("x", json!(1)), ("y", json!(2)), ("z", json!(3))]);
        let keys: Vec<_> = store.snapshot().keys().cloned().collect();
        assert_eq!(keys, vec!["y", "z"]);
    }

    #[test]
    fn zero_capacity_holds_nothing() {
        let store = SharedState::new(0);
        store.set("a", json!(true));
        assert!(store.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_writers_do_not_lose_entries() {
        let store = SharedState::new(1000);
        let mut handles = Vec::new();
        for w in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..100 {
                    store.set(format!("w{w}-{i}"), json!(i));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(store.len(), 800);
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(capacity in 0usize..16, keys in proptest::collection::vec(0u8..32, 0..64)) {
            let store = SharedState::new(capacity);
            for k in &keys {
                store.set(k.to_string(), json!(k));
                prop_assert!(store.len() <= capacity);
            }

            // Reference model: insertion-ordered keys, trimmed from the front.
            let mut model: Vec<String> = Vec::new();
            for k in &keys {
                let k = k.to_string();
                if !model.contains(&k) {
                    model.push(k);
                }
                while model.len() > capacity {
                    model.remove(0);
                }
            }
            let snapshot: Vec<String> = store.snapshot().keys().cloned().collect();
            prop_assert_eq!(snapshot, model);
        }
    }
}
