//! Storage implementations for guard and registry state.
//!
//! Provides concurrent, sharded storage for session records and category
//! entries.

use crate::application::ports::Storage;
use dashmap::DashMap;
use std::hash::Hash;

/// Thread-safe sharded storage backed by DashMap.
///
/// DashMap provides lock-free reads and fine-grained locking for writes.
/// The entry API holds the shard lock for the duration of an accessor,
/// which gives the guard its per-identity serialization: a consume cannot
/// interleave with another consume or with expiry on the same key.
#[derive(Debug)]
pub struct ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    map: DashMap<K, V>,
}

impl<K, V> ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create a new sharded storage instance.
    pub fn new() -> Self {
        Self {
            map: DashMap::new(),
        }
    }
}

impl<K, V> Default for ShardedStorage<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Storage<K, V> for ShardedStorage<K, V>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug,
    V: Send + Sync + std::fmt::Debug,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        let entry = self.map.entry(key);
        let mut value_ref = entry.or_insert_with(factory);
        accessor(&mut value_ref)
    }

    fn with_existing_mut<F, R>(&self, key: &K, accessor: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        self.map.get_mut(key).map(|mut entry| accessor(&mut entry))
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    fn clear(&self) {
        self.map.clear()
    }

    fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        for entry in self.map.iter() {
            f(entry.key(), entry.value());
        }
    }

    fn for_each_mut<F>(&self, mut f: F)
    where
        F: FnMut(&K, &mut V),
    {
        for mut entry in self.map.iter_mut() {
            let (key, value) = entry.pair_mut();
            f(key, value);
        }
    }

    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        self.map.retain(f);
    }
}

// Implement Storage for Arc<ShardedStorage> to allow it to be used directly
impl<K, V> Storage<K, V> for std::sync::Arc<ShardedStorage<K, V>>
where
    K: Hash + Eq + Clone + Send + Sync + std::fmt::Debug,
    V: Send + Sync + std::fmt::Debug,
{
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R,
    {
        (**self).with_entry_mut(key, factory, accessor)
    }

    fn with_existing_mut<F, R>(&self, key: &K, accessor: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R,
    {
        (**self).with_existing_mut(key, accessor)
    }

    fn len(&self) -> usize {
        (**self).len()
    }

    fn is_empty(&self) -> bool {
        (**self).is_empty()
    }

    fn clear(&self) {
        (**self).clear()
    }

    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V),
    {
        (**self).for_each(f)
    }

    fn for_each_mut<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V),
    {
        (**self).for_each_mut(f)
    }

    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool,
    {
        (**self).retain(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_entry_mut_creates_and_updates() {
        let storage: ShardedStorage<String, i32> = ShardedStorage::new();

        let value = storage.with_entry_mut("key".to_string(), || 10, |v| *v);
        assert_eq!(value, 10);

        let value = storage.with_entry_mut(
            "key".to_string(),
            || 99, // factory unused, entry exists
            |v| {
                *v += 1;
                *v
            },
        );
        assert_eq!(value, 11);
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn test_with_existing_mut_never_creates() {
        let storage: ShardedStorage<String, i32> = ShardedStorage::new();

        assert_eq!(storage.with_existing_mut(&"missing".to_string(), |v| *v), None);
        assert!(storage.is_empty());

        storage.with_entry_mut("key".to_string(), || 1, |_| ());
        let value = storage.with_existing_mut(&"key".to_string(), |v| {
            *v = 5;
            *v
        });
        assert_eq!(value, Some(5));
    }

    #[test]
    fn test_for_each_and_for_each_mut() {
        let storage: ShardedStorage<String, i32> = ShardedStorage::new();
        for i in 0..5 {
            storage.with_entry_mut(format!("key{}", i), || i, |_| ());
        }

        storage.for_each_mut(|_, v| *v *= 2);

        let mut sum = 0;
        storage.for_each(|_, v| sum += *v);
        assert_eq!(sum, 20); // (0+1+2+3+4) * 2
    }

    #[test]
    fn test_retain() {
        let storage: ShardedStorage<String, i32> = ShardedStorage::new();
        for i in 0..10 {
            storage.with_entry_mut(format!("key{}", i), || i, |_| ());
        }

        storage.retain(|_, v| *v % 2 == 0);
        assert_eq!(storage.len(), 5);
    }

    #[test]
    fn test_clear() {
        let storage: ShardedStorage<String, i32> = ShardedStorage::new();
        storage.with_entry_mut("key".to_string(), || 1, |_| ());

        storage.clear();
        assert!(storage.is_empty());
    }

    #[test]
    fn test_concurrent_entry_access_serializes_per_key() {
        use std::sync::Arc;
        use std::thread;

        let storage: Arc<ShardedStorage<String, i32>> = Arc::new(ShardedStorage::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let storage = Arc::clone(&storage);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    storage.with_entry_mut("shared".to_string(), || 0, |v| *v += 1);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // Increments are read-modify-write under the entry lock; none lost.
        let value = storage.with_existing_mut(&"shared".to_string(), |v| *v);
        assert_eq!(value, Some(1000));
    }
}
