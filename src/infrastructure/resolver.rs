//! Resolution strategy adapters.
//!
//! Provides the pseudo-random resolver used by production sweeps. Tests
//! should inject the deterministic stubs from `crate::infrastructure::mocks`
//! instead.

use crate::application::ports::Resolver;
use rand::Rng;
use std::fmt;

/// Error returned when a resolver is constructed with a probability
/// outside [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidProbability {
    /// The rejected value.
    pub value: f64,
}

impl fmt::Display for InvalidProbability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "success rate {} is outside [0, 1]", self.value)
    }
}

impl std::error::Error for InvalidProbability {}

/// Resolver that succeeds with a fixed probability.
#[derive(Debug, Clone, Copy)]
pub struct RandomResolver {
    success_rate: f64,
}

impl RandomResolver {
    /// Success probability used by `Default`.
    pub const DEFAULT_SUCCESS_RATE: f64 = 0.7;

    /// Create a resolver with the given success probability.
    ///
    /// # Errors
    /// Returns [`InvalidProbability`] when the rate is not in [0, 1].
    pub fn new(success_rate: f64) -> Result<Self, InvalidProbability> {
        if !(0.0..=1.0).contains(&success_rate) {
            return Err(InvalidProbability {
                value: success_rate,
            });
        }
        Ok(Self { success_rate })
    }

    /// The configured success probability.
    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }
}

impl Default for RandomResolver {
    fn default() -> Self {
        Self {
            success_rate: Self::DEFAULT_SUCCESS_RATE,
        }
    }
}

impl Resolver for RandomResolver {
    fn attempt(&self) -> bool {
        rand::thread_rng().gen_bool(self.success_rate)
    }
}
