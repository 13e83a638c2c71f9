//! Registry of named categories with independent lifecycle state.
//!
//! The registry holds a fixed catalogue of category names (here: error
//! kinds), each with a weight-driven lifecycle state. Observations move
//! entries between bands, sweeps attempt probabilistic resolution of
//! pending entries, and a force-resolve administratively closes the lot.
//!
//! Unknown names are registered on the fly with a default weight rather
//! than rejected. This is deliberately permissive; a stricter deployment
//! may want a closed catalogue instead.

use crate::application::ports::{Clock, Resolver, Storage};
use crate::domain::category::{CategoryEntry, CategoryState, ObservationOutcome};

use std::sync::Arc;
use tracing::debug;

/// Result of recording one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Observation {
    /// The category the observation landed on.
    pub category: String,
    /// The band the observation's weight fell into.
    pub outcome: ObservationOutcome,
}

/// Result of a resolution sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SweepReport {
    /// Entries that were pending and got a resolution attempt.
    pub attempted: usize,
    /// Attempts that succeeded.
    pub resolved: usize,
    /// Names still pending after the sweep, sorted.
    pub pending: Vec<String>,
}

/// Aggregate registry health.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RegistryStatus {
    /// Entries in the registry.
    pub total: usize,
    /// Entries currently unresolved.
    pub unresolved_count: usize,
    /// Names of the unresolved entries, sorted.
    pub unresolved_names: Vec<String>,
    /// True when nothing is unresolved.
    pub all_resolved: bool,
}

/// Registry managing category lifecycle state.
///
/// This type is generic over the storage implementation. In production, use
/// `Arc<ShardedStorage>`.
#[derive(Clone)]
pub struct CategoryRegistry<S>
where
    S: Storage<String, CategoryEntry> + Clone,
{
    storage: S,
    clock: Arc<dyn Clock>,
    resolver: Arc<dyn Resolver>,
}

impl<S> CategoryRegistry<S>
where
    S: Storage<String, CategoryEntry> + Clone,
{
    /// Create a registry seeded with a catalogue of `(name, weight)` pairs.
    ///
    /// Catalogue entries start resolved with nothing observed. Entries are
    /// never removed; a registry lives as long as the process.
    pub fn new(
        storage: S,
        clock: Arc<dyn Clock>,
        resolver: Arc<dyn Resolver>,
        catalog: &[(&str, f64)],
    ) -> Self {
        for (name, weight) in catalog {
            storage.with_entry_mut((*name).to_string(), || CategoryEntry::new(*weight), |_| ());
        }
        Self {
            storage,
            clock,
            resolver,
        }
    }

    /// Record a weighted observation against a category.
    ///
    /// Unknown names are registered on the fly with
    /// [`CategoryEntry::DEFAULT_WEIGHT`]. The outcome is computed from the
    /// observation's weight through the fixed bands, and the entry moves to
    /// the matching state - even out of administrative closure.
    pub fn record_observation(&self, name: &str, weight: f64) -> Observation {
        let now = self.clock.now();
        let outcome = self.storage.with_entry_mut(
            name.to_string(),
            || CategoryEntry::new(CategoryEntry::DEFAULT_WEIGHT),
            |entry| entry.observe(weight, now),
        );

        debug!(category = name, outcome = outcome.as_str(), "observation recorded");
        Observation {
            category: name.to_string(),
            outcome,
        }
    }

    /// Attempt to resolve every pending entry.
    ///
    /// Each unresolved entry gets one attempt through the resolver port; a
    /// successful attempt transitions it to resolved in a single
    /// assignment, a failed one leaves it pending and reports it. Entries
    /// in other states are untouched.
    pub fn sweep(&self) -> SweepReport {
        let now = self.clock.now();
        let mut attempted = 0;
        let mut resolved = 0;
        let mut pending = Vec::new();

        self.storage.for_each_mut(|name, entry| {
            if entry.state() != CategoryState::Unresolved {
                return;
            }
            attempted += 1;
            if self.resolver.attempt() {
                entry.resolve(now);
                resolved += 1;
            } else {
                pending.push(name.clone());
            }
        });
        pending.sort();

        debug!(attempted, resolved, "resolution sweep complete");
        SweepReport {
            attempted,
            resolved,
            pending,
        }
    }

    /// Administratively close every entry, regardless of current state.
    ///
    /// Idempotent. Closure is not terminal: a later observation moves the
    /// entry back through the bands. That is intentional, not a bug.
    pub fn force_resolve_all(&self) {
        let now = self.clock.now();
        self.storage.for_each_mut(|_, entry| entry.close(now));
    }

    /// Collapse every entry to the ordinary resolved state.
    pub fn reset(&self) {
        let now = self.clock.now();
        self.storage.for_each_mut(|_, entry| entry.resolve(now));
    }

    /// Aggregate health of the registry.
    pub fn status(&self) -> RegistryStatus {
        let mut total = 0;
        let mut unresolved_names = Vec::new();

        self.storage.for_each(|name, entry| {
            total += 1;
            if entry.state() == CategoryState::Unresolved {
                unresolved_names.push(name.clone());
            }
        });
        unresolved_names.sort();

        RegistryStatus {
            total,
            unresolved_count: unresolved_names.len(),
            all_resolved: unresolved_names.is_empty(),
            unresolved_names,
        }
    }

    /// Number of entries in the registry.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if the registry holds no entries.
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
