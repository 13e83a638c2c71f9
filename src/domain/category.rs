//! Categorical lifecycle state and weight bands.
//!
//! Each named category carries an independent lifecycle state driven by
//! weighted observations. The state set is a closed enumeration so illegal
//! states are unrepresentable; transitions happen only through the methods
//! here, each a single assignment.

use std::time::Instant;

/// Lifecycle state of a category entry.
///
/// `Suppressed` is the administratively-closed variant of resolution: only
/// a registry-wide force-resolve produces it. It is not terminal; a later
/// observation moves the entry back through the weight bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum CategoryState {
    /// Observed in a bad state, pending resolution.
    Unresolved,
    /// Administratively closed.
    Suppressed,
    /// Observed in a partially-working state.
    Degraded,
    /// Resolved, nothing pending.
    Resolved,
}

impl CategoryState {
    /// True for both ordinary and administrative resolution.
    pub fn is_resolved(self) -> bool {
        matches!(self, CategoryState::Resolved | CategoryState::Suppressed)
    }
}

/// Outcome of a single observation, computed from its weight.
///
/// Bands are fixed: above 0.7 the category handled the event, at or below
/// 0.4 it needs attention, everything between is degraded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum ObservationOutcome {
    /// Weight above 0.7.
    Handled,
    /// Weight in (0.4, 0.7].
    Degraded,
    /// Weight at or below 0.4.
    NeedsAttention,
}

impl ObservationOutcome {
    /// Classify a weight into its band. Weights are clamped to [0, 1]
    /// before classification.
    pub fn from_weight(weight: f64) -> Self {
        let weight = weight.clamp(0.0, 1.0);
        if weight > 0.7 {
            ObservationOutcome::Handled
        } else if weight > 0.4 {
            ObservationOutcome::Degraded
        } else {
            ObservationOutcome::NeedsAttention
        }
    }

    /// The lifecycle state this outcome moves an entry to.
    pub fn state(self) -> CategoryState {
        match self {
            ObservationOutcome::Handled => CategoryState::Resolved,
            ObservationOutcome::Degraded => CategoryState::Degraded,
            ObservationOutcome::NeedsAttention => CategoryState::Unresolved,
        }
    }

    /// Stable wire name of the outcome.
    pub fn as_str(self) -> &'static str {
        match self {
            ObservationOutcome::Handled => "handled",
            ObservationOutcome::Degraded => "degraded",
            ObservationOutcome::NeedsAttention => "needs-attention",
        }
    }
}

/// State tracked for one named category.
#[derive(Debug, Clone)]
pub struct CategoryEntry {
    /// Bias in [0, 1] for the probabilistic resolution outcome. Not a
    /// confidence score.
    weight: f64,
    state: CategoryState,
    /// Timestamp of the last transition, if any.
    last_observed: Option<Instant>,
}

impl CategoryEntry {
    /// Weight assigned to categories registered on the fly.
    pub const DEFAULT_WEIGHT: f64 = 0.5;

    /// Create an entry for the catalogue. Entries start resolved; nothing
    /// has been observed yet.
    pub fn new(weight: f64) -> Self {
        Self {
            weight: weight.clamp(0.0, 1.0),
            state: CategoryState::Resolved,
            last_observed: None,
        }
    }

    /// Apply an observation: update the weight, reclassify, and stamp the
    /// transition time. A resolved or administratively-closed entry moves
    /// like any other; bands always win.
    pub fn observe(&mut self, weight: f64, now: Instant) -> ObservationOutcome {
        self.weight = weight.clamp(0.0, 1.0);
        let outcome = ObservationOutcome::from_weight(self.weight);
        self.state = outcome.state();
        self.last_observed = Some(now);
        outcome
    }

    /// Transition to `Resolved` (a successful sweep attempt or a
    /// registry-wide reset).
    pub fn resolve(&mut self, now: Instant) {
        self.state = CategoryState::Resolved;
        self.last_observed = Some(now);
    }

    /// Administratively close the entry.
    pub fn close(&mut self, now: Instant) {
        self.state = CategoryState::Suppressed;
        self.last_observed = Some(now);
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CategoryState {
        self.state
    }

    /// Current weight.
    pub fn weight(&self) -> f64 {
        self.weight
    }

    /// Timestamp of the last transition.
    pub fn last_observed(&self) -> Option<Instant> {
        self.last_observed
    }
}
