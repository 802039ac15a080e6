use serde_json::Value;

use super::{Connector, Session};
use crate::{
    error::{ConnectivityError, SessionError},
    outcome::{DeliveryOutcome, STATUS_FAILED, STATUS_REJECTED, STATUS_SENT},
    policy::{Backoff, RetryBudget},
};

enum SessionState<S> {
    Disconnected,
    Authenticated(S),
    /// Terminal, entered through [`SessionManager::close`].
    Closed,
}

/// Owns one reusable session and the retry policy around it.
///
/// The session is established lazily by the first [`send`](Self::send),
/// probed before every reuse and reset after connectivity failures. Every
/// method takes `&mut self`, so calls on one manager never interleave;
/// callers that share a manager put it behind a mutex.
pub struct SessionManager<C: Connector> {
    connector: C,
    state: SessionState<C::Session>,
    backoff: Backoff,
}

impl<C: Connector> SessionManager<C> {
    pub const fn new(connector: C, backoff: Backoff) -> Self {
        Self {
            connector,
            state: SessionState::Disconnected,
            backoff,
        }
    }

    pub const fn is_connected(&self) -> bool {
        matches!(self.state, SessionState::Authenticated(_))
    }

    pub const fn is_closed(&self) -> bool {
        matches!(self.state, SessionState::Closed)
    }

    /// Makes sure an authenticated session is available.
    ///
    /// An existing session is probed first; if the probe fails it is torn
    /// down and a fresh one is established. Establishment errors are
    /// returned as-is. A closed manager never reconnects.
    pub async fn ensure_connection(&mut self) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Closed => return Err(SessionError::Closed),
            SessionState::Authenticated(session) => match session.probe().await {
                Ok(()) => return Ok(()),
                Err(error) => {
                    tracing::info!(%error, "Session failed liveness probe, reconnecting");
                    self.reset().await;
                }
            },
            SessionState::Disconnected => {}
        }

        tracing::debug!("Establishing session");
        let session = self.connector.establish().await?;
        self.state = SessionState::Authenticated(session);
        tracing::info!("Session established");

        Ok(())
    }

    /// Sends `message`, reconnecting and retrying on connectivity failures.
    ///
    /// - success: 200
    /// - rejected (sender, recipient, authentication): 400, never retried
    /// - connectivity, budget exhausted: 500
    /// - unclassified failure while transmitting: 500, never retried
    #[tracing::instrument(skip_all, fields(budget = budget.get()))]
    pub async fn send(
        &mut self,
        message: &<C::Session as Session>::Message,
        budget: RetryBudget,
    ) -> DeliveryOutcome {
        let mut outcome = DeliveryOutcome::failure(Some(STATUS_FAILED), Value::Null);

        for attempt in budget.attempts() {
            let error = match self.ensure_connection().await {
                Ok(()) => match self.transmit(message).await {
                    Ok(()) => {
                        tracing::info!(attempt, "Message sent");
                        return DeliveryOutcome::success(
                            STATUS_SENT,
                            "The message was sent successfully",
                        );
                    }
                    Err(SessionError::Unclassified(reason)) => {
                        tracing::error!(attempt, %reason, "Unclassified failure while sending");
                        return DeliveryOutcome::failure(Some(STATUS_FAILED), reason);
                    }
                    Err(error) => error,
                },
                Err(error) => error,
            };

            match error {
                SessionError::Closed => {
                    tracing::warn!("Session manager is closed, not sending");
                    return DeliveryOutcome::failure(Some(STATUS_FAILED), "session manager closed");
                }
                SessionError::Rejected(rejection) => {
                    tracing::warn!(attempt, %rejection, "Message rejected, not retrying");
                    return DeliveryOutcome::failure(Some(STATUS_REJECTED), rejection.to_string());
                }
                SessionError::Connectivity(_) | SessionError::Unclassified(_) => {
                    self.reset().await;
                    outcome = DeliveryOutcome::failure(Some(STATUS_FAILED), error.to_string());

                    if budget.is_final(attempt) {
                        tracing::warn!(attempt, %error, "Retry budget exhausted");
                    } else {
                        let delay = self.backoff.delay(attempt);
                        tracing::info!(attempt, %error, ?delay, "Send failed, backing off");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        outcome
    }

    /// Terminates the session, if any, and closes the manager for good.
    ///
    /// Teardown errors are logged and dropped. Safe to call repeatedly and
    /// on a manager that never connected.
    pub async fn close(&mut self) {
        self.discard(SessionState::Closed).await;
    }

    async fn transmit(
        &mut self,
        message: &<C::Session as Session>::Message,
    ) -> Result<(), SessionError> {
        match &mut self.state {
            SessionState::Authenticated(session) => session.transmit(message).await,
            SessionState::Disconnected => Err(ConnectivityError::Disconnected(
                "No session established".to_string(),
            )
            .into()),
            SessionState::Closed => Err(SessionError::Closed),
        }
    }

    async fn reset(&mut self) {
        self.discard(SessionState::Disconnected).await;
    }

    /// Moves to `next`, terminating the current session on the way. A closed
    /// manager stays closed.
    async fn discard(&mut self, next: SessionState<C::Session>) {
        match std::mem::replace(&mut self.state, next) {
            SessionState::Authenticated(session) => {
                if let Err(error) = session.terminate().await {
                    tracing::debug!(%error, "Ignoring error while terminating session");
                }
                tracing::debug!("Session terminated");
            }
            SessionState::Closed => self.state = SessionState::Closed,
            SessionState::Disconnected => {}
        }
    }
}
