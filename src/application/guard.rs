//! Session guard coordination logic.
//!
//! The guard gates a named action to a fixed number of invocations per
//! derived identity, expires idle identities, and flags burst identity
//! creation from a single network origin as abuse.
//!
//! `validate` and `consume` form a check-then-act pair: the HTTP layer
//! validates before doing work and consumes only once the work succeeded,
//! so exhaustion counts genuinely served requests. Each call is internally
//! serialized per identity through the storage port, so concurrent racers
//! can never push a counter past the quota.

use crate::application::metrics::GuardMetrics;
use crate::application::ports::{Clock, Storage};
use crate::domain::fingerprint::{ClientFingerprint, MalformedRequest, RequestMetadata};
use crate::domain::session::SessionRecord;

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Construction-time configuration for the guard.
///
/// The defaults mirror the gated chat deployment this component came from.
/// The permanent-block policy and the 3-sessions-per-minute abuse threshold
/// look like placeholder values rather than deliberate product policy, so
/// every knob stays configurable instead of hardcoded.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Maximum gated actions per identity per session window.
    pub quota: u32,
    /// Idle time after which a session is garbage-collected.
    pub session_timeout: Duration,
    /// Window over which burst identity creation is measured.
    pub abuse_window: Duration,
    /// Distinct same-origin sessions tolerated inside the window before
    /// the batch is blocked.
    pub abuse_threshold: usize,
}

impl GuardConfig {
    /// Set the per-identity quota.
    pub fn with_quota(mut self, quota: u32) -> Self {
        self.quota = quota;
        self
    }

    /// Set the idle timeout for session expiry.
    pub fn with_session_timeout(mut self, timeout: Duration) -> Self {
        self.session_timeout = timeout;
        self
    }

    /// Set the burst-detection window.
    pub fn with_abuse_window(mut self, window: Duration) -> Self {
        self.abuse_window = window;
        self
    }

    /// Set the tolerated number of same-origin sessions per window.
    pub fn with_abuse_threshold(mut self, threshold: usize) -> Self {
        self.abuse_threshold = threshold;
        self
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            quota: 20,
            session_timeout: Duration::from_secs(24 * 60 * 60),
            abuse_window: Duration::from_secs(60),
            abuse_threshold: 3,
        }
    }
}

/// Result of a read-only gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Validation {
    /// Whether the gated action may proceed.
    pub allowed: bool,
    /// Actions left before exhaustion.
    pub remaining: u32,
    /// The identity the request resolved to. Pass back to `consume`.
    pub identity: ClientFingerprint,
}

/// Result of consuming one gated action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Consumption {
    /// False when the session is missing or blocked. A normal denied
    /// outcome, not an error.
    pub success: bool,
    /// Actions left after this consumption.
    pub remaining: u32,
}

/// Aggregate session counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GuardStats {
    /// Sessions currently tracked.
    pub total: usize,
    /// Sessions neither expired nor blocked.
    pub active: usize,
    /// Sessions blocked by exhaustion or abuse.
    pub blocked: usize,
}

/// Gates an action to a bounded number of invocations per anonymous
/// identity.
///
/// This type is generic over the storage implementation. In production, use
/// `Arc<ShardedStorage>`.
#[derive(Clone)]
pub struct SessionGuard<S>
where
    S: Storage<ClientFingerprint, SessionRecord> + Clone,
{
    storage: S,
    clock: Arc<dyn Clock>,
    config: GuardConfig,
    metrics: GuardMetrics,
}

impl<S> SessionGuard<S>
where
    S: Storage<ClientFingerprint, SessionRecord> + Clone,
{
    /// Create a guard with the default configuration.
    pub fn new(storage: S, clock: Arc<dyn Clock>) -> Self {
        Self::with_config(storage, clock, GuardConfig::default())
    }

    /// Create a guard with custom configuration.
    pub fn with_config(storage: S, clock: Arc<dyn Clock>, config: GuardConfig) -> Self {
        Self {
            storage,
            clock,
            config,
            metrics: GuardMetrics::new(),
        }
    }

    /// Check whether the caller may perform the gated action.
    ///
    /// Expires stale sessions first, creates a session on first sight, and
    /// updates the session's activity timestamp. Never touches the
    /// consumption counter; calling this any number of times without
    /// `consume` changes nothing.
    ///
    /// # Errors
    /// Returns [`MalformedRequest`] when no identity can be derived from
    /// the metadata. Exhaustion is not an error: it comes back as
    /// `allowed == false`.
    pub fn validate(&self, metadata: &RequestMetadata) -> Result<Validation, MalformedRequest> {
        let identity = ClientFingerprint::derive(metadata)?;
        self.expire_stale();

        let now = self.clock.now();
        let quota = self.config.quota;
        let origin = metadata.network_origin.clone();

        let (allowed, remaining) = self.storage.with_entry_mut(
            identity.clone(),
            || SessionRecord::new(origin, now),
            |session| {
                session.touch(now);
                if session.is_blocked() || session.consumed() >= quota {
                    (false, 0)
                } else {
                    (true, session.remaining(quota))
                }
            },
        );

        if allowed {
            self.metrics.record_check_allowed();
        } else {
            self.metrics.record_check_denied();
        }
        debug!(
            identity = identity.short(),
            allowed, remaining, "gate check"
        );

        Ok(Validation {
            allowed,
            remaining,
            identity,
        })
    }

    /// Consume one gated action for a previously validated identity.
    ///
    /// Fails on a missing session (the caller skipped `validate`) or a
    /// blocked one. The increment that reaches the quota succeeds and
    /// blocks the session, so the counter can equal but never exceed the
    /// quota - including under concurrent callers, because the storage
    /// port serializes access per identity.
    pub fn consume(&self, identity: &ClientFingerprint) -> Consumption {
        let now = self.clock.now();
        let quota = self.config.quota;

        let outcome = self.storage.with_existing_mut(identity, |session| {
            let success = session.try_consume(quota, now);
            (success, session.remaining(quota), session.is_blocked())
        });

        let Some((success, remaining, blocked)) = outcome else {
            debug!(identity = identity.short(), "consume without session");
            return Consumption {
                success: false,
                remaining: 0,
            };
        };

        if success {
            self.metrics.record_consumption();
            if blocked {
                debug!(identity = identity.short(), "quota exhausted");
            }
        }

        Consumption { success, remaining }
    }

    /// Detect burst identity creation from a single network origin.
    ///
    /// Counts distinct sessions created from the request's origin within
    /// the abuse window. When the count exceeds the threshold, every one of
    /// them is blocked and the call returns `true`.
    ///
    /// # Errors
    /// Returns [`MalformedRequest`] when no identity can be derived from
    /// the metadata.
    pub fn detect_abuse(&self, metadata: &RequestMetadata) -> Result<bool, MalformedRequest> {
        ClientFingerprint::derive(metadata)?;

        let now = self.clock.now();
        let window = self.config.abuse_window;
        let origin = metadata.network_origin.as_str();

        let mut offenders = Vec::new();
        self.storage.for_each(|identity, session| {
            if session.origin() == origin && session.created_within(now, window) {
                offenders.push(identity.clone());
            }
        });

        if offenders.len() <= self.config.abuse_threshold {
            return Ok(false);
        }

        for identity in &offenders {
            let _ = self
                .storage
                .with_existing_mut(identity, SessionRecord::block);
        }
        self.metrics.record_abuse_block();
        warn!(
            origin,
            sessions = offenders.len(),
            "burst identity creation, blocking origin's sessions"
        );

        Ok(true)
    }

    /// Remove sessions idle longer than the session timeout.
    ///
    /// Returns the number of sessions removed. Runs at the head of every
    /// `validate` so the session map cannot grow without bound; safe to
    /// call from a periodic timer as well. A session being consumed
    /// concurrently holds its entry lock and is observed with a fresh
    /// activity timestamp, never mid-mutation.
    pub fn expire_stale(&self) -> usize {
        let now = self.clock.now();
        let timeout = self.config.session_timeout;

        let before = self.storage.len();
        self.storage
            .retain(|_, session| !session.is_expired(now, timeout));
        let removed = before.saturating_sub(self.storage.len());

        if removed > 0 {
            self.metrics.record_expired(removed);
            debug!(removed, "expired idle sessions");
        }
        removed
    }

    /// Aggregate session counts. `active` excludes blocked and expired
    /// sessions.
    pub fn stats(&self) -> GuardStats {
        let now = self.clock.now();
        let timeout = self.config.session_timeout;

        let mut stats = GuardStats {
            total: 0,
            active: 0,
            blocked: 0,
        };
        self.storage.for_each(|_, session| {
            stats.total += 1;
            if session.is_blocked() {
                stats.blocked += 1;
            } else if !session.is_expired(now, timeout) {
                stats.active += 1;
            }
        });
        stats
    }

    /// Drop every session. Restart semantics; used by tests and by hosts
    /// that recycle the guard without recycling the process.
    pub fn clear(&self) {
        self.storage.clear();
    }

    /// Get a reference to the guard's configuration.
    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &GuardMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::mocks::MockClock;
    use crate::infrastructure::storage::ShardedStorage;
    use std::time::Instant;

    fn guard_with_quota(
        quota: u32,
    ) -> SessionGuard<Arc<ShardedStorage<ClientFingerprint, SessionRecord>>> {
        SessionGuard::with_config(
            Arc::new(ShardedStorage::new()),
            Arc::new(SystemClock::new()),
            GuardConfig::default().with_quota(quota),
        )
    }

    fn metadata(origin: &str, agent: &str) -> RequestMetadata {
        RequestMetadata::new(origin, agent).with_accept_language("en-US")
    }

    #[test]
    fn test_validate_creates_session_with_full_quota() {
        let guard = guard_with_quota(5);

        let validation = guard.validate(&metadata("203.0.113.7", "curl/8.0")).unwrap();

        assert!(validation.allowed);
        assert_eq!(validation.remaining, 5);
        assert_eq!(guard.stats().total, 1);
    }

    #[test]
    fn test_validate_is_idempotent() {
        let guard = guard_with_quota(5);
        let meta = metadata("203.0.113.7", "curl/8.0");

        for _ in 0..10 {
            let validation = guard.validate(&meta).unwrap();
            assert!(validation.allowed);
            assert_eq!(validation.remaining, 5);
        }
    }

    #[test]
    fn test_consume_without_validate_fails() {
        let guard = guard_with_quota(5);
        let identity =
            ClientFingerprint::derive(&metadata("203.0.113.7", "curl/8.0")).unwrap();

        let consumption = guard.consume(&identity);

        assert!(!consumption.success);
        assert_eq!(consumption.remaining, 0);
    }

    #[test]
    fn test_quota_exhaustion_end_to_end() {
        let guard = guard_with_quota(3);
        let meta = metadata("203.0.113.7", "curl/8.0");

        for expected_remaining in [2, 1, 0] {
            let validation = guard.validate(&meta).unwrap();
            assert!(validation.allowed);
            let consumption = guard.consume(&validation.identity);
            assert!(consumption.success);
            assert_eq!(consumption.remaining, expected_remaining);
        }

        let validation = guard.validate(&meta).unwrap();
        assert!(!validation.allowed);
        assert_eq!(validation.remaining, 0);

        // A different user agent is a different identity with a fresh quota.
        let other = guard.validate(&metadata("203.0.113.7", "Mozilla/5.0")).unwrap();
        assert!(other.allowed);
        assert_eq!(other.remaining, 3);
    }

    #[test]
    fn test_consume_on_blocked_session_fails() {
        let guard = guard_with_quota(1);
        let meta = metadata("203.0.113.7", "curl/8.0");

        let validation = guard.validate(&meta).unwrap();
        assert!(guard.consume(&validation.identity).success);
        assert!(!guard.consume(&validation.identity).success);
    }

    #[test]
    fn test_malformed_metadata_is_an_error() {
        let guard = guard_with_quota(5);

        assert!(guard.validate(&RequestMetadata::default()).is_err());
        assert!(guard.detect_abuse(&RequestMetadata::default()).is_err());
    }

    #[test]
    fn test_expiry_restarts_quota() {
        let start = Instant::now();
        let clock = Arc::new(MockClock::new(start));
        let guard = SessionGuard::with_config(
            Arc::new(ShardedStorage::new()),
            clock.clone(),
            GuardConfig::default()
                .with_quota(2)
                .with_session_timeout(Duration::from_secs(600)),
        );
        let meta = metadata("203.0.113.7", "curl/8.0");

        let validation = guard.validate(&meta).unwrap();
        guard.consume(&validation.identity);
        guard.consume(&validation.identity);
        assert!(!guard.validate(&meta).unwrap().allowed);

        // Past the idle timeout the record is collected and the identity
        // starts over.
        clock.advance(Duration::from_secs(601));
        assert_eq!(guard.expire_stale(), 1);

        let validation = guard.validate(&meta).unwrap();
        assert!(validation.allowed);
        assert_eq!(validation.remaining, 2);
    }

    #[test]
    fn test_validate_runs_expiry() {
        let start = Instant::now();
        let clock = Arc::new(MockClock::new(start));
        let guard = SessionGuard::with_config(
            Arc::new(ShardedStorage::new()),
            clock.clone(),
            GuardConfig::default().with_session_timeout(Duration::from_secs(600)),
        );

        guard.validate(&metadata("203.0.113.7", "curl/8.0")).unwrap();
        clock.advance(Duration::from_secs(601));

        // The expired record disappears as a side effect of an unrelated
        // validate.
        guard.validate(&metadata("203.0.113.8", "curl/8.0")).unwrap();
        assert_eq!(guard.stats().total, 1);
        assert_eq!(guard.metrics().sessions_expired(), 1);
    }

    #[test]
    fn test_abuse_detection_blocks_origin_batch() {
        let guard = guard_with_quota(5);

        // Four distinct identities from one origin, right away.
        for agent in ["a", "b", "c", "d"] {
            guard.validate(&metadata("203.0.113.7", agent)).unwrap();
        }

        let flagged = guard.detect_abuse(&metadata("203.0.113.7", "d")).unwrap();
        assert!(flagged);

        // Every one of them is now blocked.
        for agent in ["a", "b", "c", "d"] {
            let validation = guard.validate(&metadata("203.0.113.7", agent)).unwrap();
            assert!(!validation.allowed);
        }
        assert_eq!(guard.stats().blocked, 4);
    }

    #[test]
    fn test_abuse_detection_tolerates_threshold() {
        let guard = guard_with_quota(5);

        for agent in ["a", "b", "c"] {
            guard.validate(&metadata("203.0.113.7", agent)).unwrap();
        }

        assert!(!guard.detect_abuse(&metadata("203.0.113.7", "c")).unwrap());
        assert_eq!(guard.stats().blocked, 0);
    }

    #[test]
    fn test_abuse_detection_ignores_other_origins() {
        let guard = guard_with_quota(5);

        for agent in ["a", "b", "c", "d"] {
            guard.validate(&metadata("203.0.113.7", agent)).unwrap();
        }
        guard.validate(&metadata("198.51.100.1", "e")).unwrap();

        assert!(guard.detect_abuse(&metadata("203.0.113.7", "a")).unwrap());

        let bystander = guard.validate(&metadata("198.51.100.1", "e")).unwrap();
        assert!(bystander.allowed);
    }

    #[test]
    fn test_abuse_window_excludes_old_sessions() {
        let start = Instant::now();
        let clock = Arc::new(MockClock::new(start));
        let guard = SessionGuard::with_config(
            Arc::new(ShardedStorage::new()),
            clock.clone(),
            GuardConfig::default(),
        );

        for agent in ["a", "b", "c"] {
            guard.validate(&metadata("203.0.113.7", agent)).unwrap();
        }
        clock.advance(Duration::from_secs(61));
        guard.validate(&metadata("203.0.113.7", "d")).unwrap();

        // Only one session was created inside the window.
        assert!(!guard.detect_abuse(&metadata("203.0.113.7", "d")).unwrap());
    }

    #[test]
    fn test_stats_classification() {
        let start = Instant::now();
        let clock = Arc::new(MockClock::new(start));
        let guard = SessionGuard::with_config(
            Arc::new(ShardedStorage::new()),
            clock.clone(),
            GuardConfig::default()
                .with_quota(1)
                .with_session_timeout(Duration::from_secs(600)),
        );

        let exhausted = guard.validate(&metadata("203.0.113.7", "a")).unwrap();
        guard.consume(&exhausted.identity);
        guard.validate(&metadata("203.0.113.7", "b")).unwrap();

        let stats = guard.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.blocked, 1);
    }

    #[test]
    fn test_metrics_track_outcomes() {
        let guard = guard_with_quota(1);
        let meta = metadata("203.0.113.7", "curl/8.0");

        let validation = guard.validate(&meta).unwrap();
        guard.consume(&validation.identity);
        guard.validate(&meta).unwrap();

        let snapshot = guard.metrics().snapshot();
        assert_eq!(snapshot.checks_allowed, 1);
        assert_eq!(snapshot.checks_denied, 1);
        assert_eq!(snapshot.consumptions, 1);
    }

    #[test]
    fn test_clear_drops_all_sessions() {
        let guard = guard_with_quota(5);
        guard.validate(&metadata("203.0.113.7", "a")).unwrap();
        guard.validate(&metadata("203.0.113.7", "b")).unwrap();

        guard.clear();
        assert_eq!(guard.stats().total, 0);
    }

    #[test]
    fn test_concurrent_consume_never_exceeds_quota() {
        use std::thread;

        let quota = 50;
        let guard = Arc::new(guard_with_quota(quota));
        let meta = metadata("203.0.113.7", "curl/8.0");
        let identity = guard.validate(&meta).unwrap().identity;

        let mut handles = vec![];
        for _ in 0..10 {
            let guard = Arc::clone(&guard);
            let identity = identity.clone();
            handles.push(thread::spawn(move || {
                let mut consumed = 0;
                for _ in 0..20 {
                    if guard.consume(&identity).success {
                        consumed += 1;
                    }
                }
                consumed
            }));
        }

        let total: u32 = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // 200 attempts race on one identity; exactly quota succeed.
        assert_eq!(total, quota);
        assert_eq!(guard.metrics().consumptions(), quota as u64);
        assert!(!guard.validate(&meta).unwrap().allowed);
    }
}
