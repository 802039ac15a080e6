//! The uniform result of a delivery attempt sequence.

use serde::Serialize;
use serde_json::Value;

/// Synthesized status for a confirmed send over a stateful session.
pub const STATUS_SENT: u16 = 200;
/// Synthesized status for a request the remote service refused.
pub const STATUS_REJECTED: u16 = 400;
/// Synthesized status for connectivity and unclassified failures.
pub const STATUS_FAILED: u16 = 500;

/// What came of one top-level `send`/`dispatch` call.
///
/// Built once when the call returns and read-only afterwards. A successful
/// outcome always carries a 2xx status.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryOutcome {
    status_code: Option<u16>,
    details: Value,
    succeeded: bool,
}

impl DeliveryOutcome {
    pub(crate) fn success(status_code: u16, details: impl Into<Value>) -> Self {
        debug_assert!(
            (200..300).contains(&status_code),
            "successful outcome with status {status_code}"
        );
        Self {
            status_code: Some(status_code),
            details: details.into(),
            succeeded: true,
        }
    }

    pub(crate) fn failure(status_code: Option<u16>, details: impl Into<Value>) -> Self {
        Self {
            status_code,
            details: details.into(),
            succeeded: false,
        }
    }

    /// Transport status, or the synthesized code on the stateful path.
    pub const fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Response body on the stateless path, a description otherwise.
    pub const fn details(&self) -> &Value {
        &self.details
    }

    pub const fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn into_details(self) -> Value {
        self.details
    }
}
