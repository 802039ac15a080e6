use std::{num::NonZeroU32, ops::Range, time::Duration};

use herald_common::config::BackoffSettings;
use serde::{Deserialize, Serialize};

use crate::error::InvalidRetryBudget;

/// Number of backoff units to wait after failed attempt `attempt`
/// (0-based): `2^attempt`, saturating at `u64::MAX`.
#[must_use]
pub const fn backoff_units(attempt: u32) -> u64 {
    2u64.saturating_pow(attempt)
}

/// Maps attempt indices onto sleep durations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    unit: Duration,
}

impl Backoff {
    #[must_use]
    pub const fn new(unit: Duration) -> Self {
        Self { unit }
    }

    #[must_use]
    pub const fn unit(&self) -> Duration {
        self.unit
    }

    /// How long to sleep after failed attempt `attempt` before the next one.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let units = u32::try_from(backoff_units(attempt)).unwrap_or(u32::MAX);
        self.unit.saturating_mul(units)
    }
}

impl Default for Backoff {
    fn default() -> Self {
        BackoffSettings::default().into()
    }
}

impl From<BackoffSettings> for Backoff {
    fn from(settings: BackoffSettings) -> Self {
        Self::new(settings.unit())
    }
}

/// Total number of attempts a delivery call may make, always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct RetryBudget(NonZeroU32);

impl RetryBudget {
    /// `None` for a zero budget.
    #[must_use]
    pub const fn new(attempts: u32) -> Option<Self> {
        match NonZeroU32::new(attempts) {
            Some(attempts) => Some(Self(attempts)),
            None => None,
        }
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Attempt indices `0..budget`.
    #[must_use]
    pub const fn attempts(self) -> Range<u32> {
        0..self.0.get()
    }

    /// Whether `attempt` is the last one the budget allows.
    #[must_use]
    pub const fn is_final(self, attempt: u32) -> bool {
        attempt.saturating_add(1) >= self.0.get()
    }
}

impl Default for RetryBudget {
    fn default() -> Self {
        Self(NonZeroU32::MIN.saturating_add(2))
    }
}

impl TryFrom<u32> for RetryBudget {
    type Error = InvalidRetryBudget;

    fn try_from(attempts: u32) -> Result<Self, Self::Error> {
        Self::new(attempts).ok_or(InvalidRetryBudget)
    }
}

impl From<RetryBudget> for u32 {
    fn from(budget: RetryBudget) -> Self {
        budget.get()
    }
}
