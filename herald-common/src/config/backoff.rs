//! Time-unit for exponential backoff.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Attempt `i` waits `2^i` of these units before attempt `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffSettings {
    /// Length of one backoff unit in milliseconds.
    ///
    /// Default: 1000 (one second)
    #[serde(default = "defaults::unit_ms")]
    pub unit_ms: u64,
}

impl Default for BackoffSettings {
    fn default() -> Self {
        Self {
            unit_ms: defaults::unit_ms(),
        }
    }
}

impl BackoffSettings {
    #[must_use]
    pub const fn unit(&self) -> Duration {
        Duration::from_millis(self.unit_ms)
    }
}

mod defaults {
    pub const fn unit_ms() -> u64 {
        1000
    }
}
