//! Retry-with-backoff dispatch over a pooled transport.

use reqwest::Url;
use serde_json::Value;

use crate::{
    error::{ErrorClass, TransportError},
    outcome::{DeliveryOutcome, STATUS_FAILED},
    policy::{Backoff, RetryBudget},
    transport::{Payload, PayloadEncoding, PooledTransport},
};

/// Sends `payload` to `target`, retrying server-side failures.
///
/// Each attempt issues one request:
///
/// - 2xx returns a successful outcome at once
/// - 4xx returns a failed outcome at once; client errors are never retried
/// - anything else (other statuses, transport errors) sleeps
///   `backoff.delay(attempt)` and tries again while the budget lasts
///
/// A transport error counts as its embedded status, or 500 if it has none.
/// Nothing sleeps after the last attempt, and a closed transport fails
/// immediately with no status.
#[tracing::instrument(
    skip_all,
    fields(host = %host_of(target), budget = budget.get())
)]
pub async fn dispatch<T>(
    target: &str,
    encoding: PayloadEncoding,
    payload: &Payload,
    budget: RetryBudget,
    backoff: Backoff,
    transport: &T,
) -> DeliveryOutcome
where
    T: PooledTransport + ?Sized,
{
    let mut outcome = DeliveryOutcome::failure(None, Value::Null);

    for attempt in budget.attempts() {
        let status = match transport.post(target, encoding, payload).await {
            Ok(response) => {
                let status = response.status;
                if ErrorClass::of_status(status) == ErrorClass::Success {
                    tracing::info!(attempt, status, "Request delivered");
                    return DeliveryOutcome::success(status, response.body);
                }
                outcome = DeliveryOutcome::failure(Some(status), response.body);
                status
            }
            Err(TransportError::Closed) => {
                tracing::warn!("Transport is closed, not sending");
                return DeliveryOutcome::failure(None, "transport closed");
            }
            Err(error) => {
                let status = error.embedded_status().unwrap_or(STATUS_FAILED);
                outcome = DeliveryOutcome::failure(Some(status), error.to_string());
                status
            }
        };

        let class = ErrorClass::of_status(status);
        if class == ErrorClass::Client {
            tracing::warn!(attempt, status, ?class, "Request rejected, not retrying");
            return outcome;
        }

        if budget.is_final(attempt) {
            tracing::warn!(attempt, status, ?class, "Retry budget exhausted");
        } else {
            let delay = backoff.delay(attempt);
            tracing::info!(attempt, status, ?class, ?delay, "Request failed, backing off");
            tokio::time::sleep(delay).await;
        }
    }

    outcome
}

/// The host part of `target`, which is all that gets logged.
fn host_of(target: &str) -> String {
    Url::parse(target)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_default()
}
