//! Per-identity session state and quota arithmetic.
//!
//! A session tracks how many gated actions an identity has consumed. The
//! counter is monotonically non-decreasing for the session's lifetime and
//! can equal but never exceed the quota; the request that brings it to the
//! quota is served, everything after it is denied.

use std::time::{Duration, Instant};

/// Consumption state for a single anonymous identity.
#[derive(Debug, Clone)]
pub struct SessionRecord {
    /// Network origin the identity was first seen from. Grouping key for
    /// burst-creation abuse detection.
    origin: String,
    /// Gated actions consumed so far.
    consumed: u32,
    /// When this identity was first seen.
    created_at: Instant,
    /// Last validate/consume contact.
    last_activity: Instant,
    /// Permanently denied. Set on exhaustion or abuse, cleared only by
    /// expiry removing the whole record.
    blocked: bool,
}

impl SessionRecord {
    /// Create a fresh session for a first-seen identity.
    pub fn new(origin: impl Into<String>, now: Instant) -> Self {
        Self {
            origin: origin.into(),
            consumed: 0,
            created_at: now,
            last_activity: now,
            blocked: false,
        }
    }

    /// Consume one gated action.
    ///
    /// Returns `false` without touching the counter when the session is
    /// blocked or already at quota. On the increment that reaches the quota
    /// the session blocks itself, so later calls fail.
    pub fn try_consume(&mut self, quota: u32, now: Instant) -> bool {
        if self.blocked || self.consumed >= quota {
            return false;
        }

        self.consumed += 1;
        self.last_activity = now;
        if self.consumed >= quota {
            self.blocked = true;
        }
        true
    }

    /// Actions left before the quota is reached.
    pub fn remaining(&self, quota: u32) -> u32 {
        if self.blocked {
            return 0;
        }
        quota.saturating_sub(self.consumed)
    }

    /// Record contact without consuming.
    pub fn touch(&mut self, now: Instant) {
        self.last_activity = now;
    }

    /// Deny all further consumption for this identity.
    pub fn block(&mut self) {
        self.blocked = true;
    }

    /// True once the session has been idle longer than `timeout`.
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    /// True when the session was created within `window` of `now`.
    pub fn created_within(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.created_at) <= window
    }

    /// Network origin this identity was first seen from.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Gated actions consumed so far.
    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    /// Whether the session is permanently denied.
    pub fn is_blocked(&self) -> bool {
        self.blocked
    }

    /// When this identity was first seen.
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Last validate/consume contact.
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }
}
