//! Keyed entity storage.
//!
//! The engine reaches workspaces, rooms, documents, chat channels and
//! presence records only through [`Store`], so the in-memory maps used here
//! can be swapped for another backing without touching component logic.
//!
//! Methods are synchronous and hold the map lock only for the duration of a
//! single map operation; values are cheap handles (`Arc`s or actor handles)
//! that carry their own locking.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

pub trait Store<K, V>: Send + Sync {
    fn get(&self, key: &K) -> Option<V>;

    /// Insert or overwrite; returns the previous value.
    fn put(&self, key: K, value: V) -> Option<V>;

    fn delete(&self, key: &K) -> Option<V>;

    /// Return the stored value for `key`, inserting `value` first if absent.
    /// The boolean is true when `value` was inserted.
    fn get_or_insert(&self, key: K, value: V) -> (V, bool);

    /// Snapshot of the key set at call time.
    fn keys(&self) -> Vec<K>;

    /// Snapshot of the values at call time.
    fn values(&self) -> Vec<V>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// `RwLock<HashMap>` backed store.
pub struct MemoryStore<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K, V> MemoryStore<K, V> {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }
}

impl<K, V> Default for MemoryStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Store<K, V> for MemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn get(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(key).cloned()
    }

    fn put(&self, key: K, value: V) -> Option<V> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, value)
    }

    fn delete(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key)
    }

    fn get_or_insert(&self, key: K, value: V) -> (V, bool) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&key) {
            Some(existing) => (existing.clone(), false),
            None => {
                entries.insert(key, value.clone());
                (value, true)
            }
        }
    }

    fn keys(&self) -> Vec<K> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.keys().cloned().collect()
    }

    fn values(&self) -> Vec<V> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.values().cloned().collect()
    }

    fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_put_get_delete() {
        let store: MemoryStore<u32, String> = MemoryStore::new();
        assert!(store.is_empty());

        assert_eq!(store.put(1, "a".into()), None);
        assert_eq!(store.put(1, "b".into()), Some("a".into()));
        assert_eq!(store.get(&1), Some("b".into()));
        assert_eq!(store.len(), 1);

        assert_eq!(store.delete(&1), Some("b".into()));
        assert_eq!(store.get(&1), None);
    }

    #[test]
    fn test_get_or_insert_keeps_existing() {
        let store: MemoryStore<u32, u32> = MemoryStore::new();
        assert_eq!(store.get_or_insert(7, 1), (1, true));
        assert_eq!(store.get_or_insert(7, 2), (1, false));
    }

    #[test]
    fn test_usable_as_trait_object() {
        let store: Arc<dyn Store<u32, u32>> = Arc::new(MemoryStore::new());
        store.put(1, 10);
        store.put(2, 20);

        let mut keys = store.keys();
        keys.sort();
        assert_eq!(keys, vec![1, 2]);
        assert_eq!(store.values().iter().sum::<u32>(), 30);
    }
}
