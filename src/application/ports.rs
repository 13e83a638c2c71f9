//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the
//! application layer needs. Infrastructure adapters implement these ports.

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Instant;

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time without
/// depending on system clock implementation details. Infrastructure provides
/// concrete implementations (SystemClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Port for a single probabilistic resolution attempt.
///
/// The category registry asks this port whether a pending entry resolves
/// during a sweep. Production uses a pseudo-random implementation
/// (RandomResolver); tests inject deterministic stubs (FixedResolver,
/// SequenceResolver) so sweep outcomes are reproducible.
pub trait Resolver: Send + Sync + Debug {
    /// Attempt one resolution. Returns true on success.
    fn attempt(&self) -> bool;
}

/// Port for concurrent key-value storage.
///
/// This abstraction allows the application layer to store and retrieve
/// values without depending on specific concurrent data structure
/// implementations. `with_entry_mut` and `with_existing_mut` hold the
/// entry's lock for the duration of the accessor, which is the per-key
/// serialization the guard relies on: two racers on the same identity can
/// never both read a counter before either writes it.
pub trait Storage<K, V>: Send + Sync + Debug
where
    K: Hash + Eq + Clone + Send + Sync,
    V: Send + Sync,
{
    /// Access an entry with mutable access, creating it if necessary.
    ///
    /// # Arguments
    /// * `key` - The key to look up
    /// * `factory` - Function to create a new value if the key doesn't exist
    /// * `accessor` - Function that gets mutable access to the value
    ///
    /// # Returns
    /// The result from the accessor function
    fn with_entry_mut<F, R>(&self, key: K, factory: impl FnOnce() -> V, accessor: F) -> R
    where
        F: FnOnce(&mut V) -> R;

    /// Access an existing entry with mutable access.
    ///
    /// Returns `None` without invoking the accessor when the key is absent.
    /// Never creates an entry.
    fn with_existing_mut<F, R>(&self, key: &K, accessor: F) -> Option<R>
    where
        F: FnOnce(&mut V) -> R;

    /// Get the number of entries in the storage.
    fn len(&self) -> usize;

    /// Check if the storage is empty.
    fn is_empty(&self) -> bool;

    /// Clear all entries from the storage.
    fn clear(&self);

    /// Iterate over all entries, providing access to both key and value.
    fn for_each<F>(&self, f: F)
    where
        F: FnMut(&K, &V);

    /// Iterate over all entries with mutable access to each value.
    fn for_each_mut<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V);

    /// Remove entries for which the predicate returns false.
    fn retain<F>(&self, f: F)
    where
        F: FnMut(&K, &mut V) -> bool;
}
