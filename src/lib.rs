//! # session-guard
//!
//! Request gating for anonymous callers, with device-fingerprint identity
//! and quota enforcement, plus a registry of named categories moving
//! through a small lifecycle state machine.
//!
//! Two cooperating, self-contained components:
//!
//! - [`SessionGuard`] derives a stable identity from request metadata,
//!   tracks a consumption counter against a fixed quota, expires idle
//!   identities, and blocks bursts of fresh identities from one network
//!   origin.
//! - [`CategoryRegistry`] holds a fixed catalogue of named categories
//!   (error kinds, typically), each with a weight-driven lifecycle state,
//!   and supports bulk resolution sweeps and aggregate status reporting.
//!
//! All state lives in process memory. A restart clears every session and
//! returns the catalogue to its declared initial state; there is no
//! persistence and no cross-instance coordination.
//!
//! ## Quick Start
//!
//! ```rust
//! use session_guard::{GuardConfig, RequestMetadata, SessionGuard, ShardedStorage, SystemClock};
//! use std::sync::Arc;
//!
//! let guard = SessionGuard::with_config(
//!     Arc::new(ShardedStorage::new()),
//!     Arc::new(SystemClock::new()),
//!     GuardConfig::default().with_quota(20),
//! );
//!
//! let metadata = RequestMetadata::new("203.0.113.7", "Mozilla/5.0")
//!     .with_accept_language("en-US,en;q=0.9")
//!     .with_accept_encoding("gzip, br");
//!
//! let validation = guard.validate(&metadata).expect("metadata carries identity fields");
//! if validation.allowed {
//!     // ... perform the gated action, then count it:
//!     let consumption = guard.consume(&validation.identity);
//!     assert!(consumption.success);
//! } else {
//!     // surface a rate-limit response (HTTP 429) with remaining = 0
//! }
//! ```
//!
//! ## Check, then act
//!
//! `validate` is a read-only gate check; `consume` counts one served
//! action. The split lets the HTTP layer charge the quota only for
//! requests that were actually served: validate up front, do the work,
//! consume on success. Both calls serialize per identity inside the
//! storage port, so racing callers can never push a counter past the
//! quota - the counter may reach the quota, never exceed it.
//!
//! Exhaustion and abuse blocks are ordinary outcomes (`allowed == false`,
//! `success == false`), not errors. The only error in the API is
//! [`MalformedRequest`], returned when no identity-contributing field is
//! present at all.
//!
//! ## Category sweeps
//!
//! ```rust
//! use session_guard::{CategoryRegistry, RandomResolver, ShardedStorage, SystemClock};
//! use std::sync::Arc;
//!
//! let registry = CategoryRegistry::new(
//!     Arc::new(ShardedStorage::new()),
//!     Arc::new(SystemClock::new()),
//!     Arc::new(RandomResolver::default()),
//!     &[("timeout", 0.8), ("validation", 0.6), ("upstream", 0.3)],
//! );
//!
//! registry.record_observation("upstream", 0.2); // needs attention
//! let report = registry.sweep();
//! assert_eq!(report.attempted, 1);
//! ```
//!
//! The sweep's probabilistic outcome goes through the [`Resolver`] port.
//! Production uses [`RandomResolver`]; tests inject the deterministic
//! stubs from `infrastructure::mocks` (enable the `test-helpers` feature)
//! so sweep results are reproducible.
//!
//! ## Identity is a heuristic
//!
//! The fingerprint hashes network origin, user agent, and accept/client
//! hint headers in a fixed order. It is deliberately not a security
//! boundary: a caller that rewrites headers gets a fresh identity, which
//! is why [`SessionGuard::detect_abuse`] watches for many fresh
//! identities appearing from one origin inside a short window and blocks
//! the whole batch.

// Domain layer - pure business logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    category::{CategoryEntry, CategoryState, ObservationOutcome},
    fingerprint::{ClientFingerprint, MalformedRequest, RequestMetadata},
    session::SessionRecord,
};

pub use application::{
    guard::{Consumption, GuardConfig, GuardStats, SessionGuard, Validation},
    metrics::{GuardMetrics, GuardMetricsSnapshot},
    ports::{Clock, Resolver, Storage},
    registry::{CategoryRegistry, Observation, RegistryStatus, SweepReport},
};

pub use infrastructure::{
    clock::SystemClock,
    resolver::{InvalidProbability, RandomResolver},
    storage::ShardedStorage,
};
