//! Error taxonomy for delivery attempts.
//!
//! Classification, not type identity, decides what happens next:
//!
//! - Client/rejection failures (4xx, refused sender/recipient/login) stop
//!   immediately
//! - Connectivity failures (timeouts, drops, 5xx) are retried with backoff
//! - Unclassified failures on a live session are terminal

use herald_smtp::ClientError;
use thiserror::Error;

/// How a status code or error steers the retry loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Success,
    /// Never retried.
    Client,
    /// Retried with backoff until the budget runs out.
    Transient,
    /// Terminal on the stateful path.
    Unclassified,
}

impl ErrorClass {
    /// Classifies a transport status: 2xx success, 4xx client, anything
    /// else transient.
    #[must_use]
    pub const fn of_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Success,
            400..=499 => Self::Client,
            _ => Self::Transient,
        }
    }
}

/// A request through a [`PooledTransport`](crate::PooledTransport) that did
/// not produce a response.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The request failed; `status` is set when the failure carried one.
    #[error("{message}")]
    Request {
        status: Option<u16>,
        message: String,
    },

    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The pool was closed; nothing is sent any more.
    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    /// The status code carried by the failure, if any.
    #[must_use]
    pub const fn embedded_status(&self) -> Option<u16> {
        match self {
            Self::Request { status, .. } => *status,
            Self::Timeout(_) | Self::Closed => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        // Bot tokens travel in the URL path.
        let error = error.without_url();
        if error.is_timeout() {
            Self::Timeout(error.to_string())
        } else {
            Self::Request {
                status: error.status().map(|status| status.as_u16()),
                message: error.to_string(),
            }
        }
    }
}

/// A failure on the stateful session path.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The connection is gone or never came up. Reset and retry.
    #[error("Connectivity failure: {0}")]
    Connectivity(#[from] ConnectivityError),

    /// The remote service refused the request itself. Never retried.
    #[error("Rejected: {0}")]
    Rejected(#[from] RejectionError),

    /// Anything else.
    #[error("Unclassified failure: {0}")]
    Unclassified(String),

    /// The manager was closed by its owner.
    #[error("Session manager is closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),

    #[error("Server disconnected: {0}")]
    Disconnected(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    /// The server announced it is closing the channel (SMTP 421).
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

#[derive(Debug, Error)]
pub enum RejectionError {
    #[error("Recipient refused: {0}")]
    Recipient(String),

    #[error("Sender refused: {0}")]
    Sender(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl SessionError {
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self {
            Self::Connectivity(_) => ErrorClass::Transient,
            Self::Rejected(_) => ErrorClass::Client,
            Self::Unclassified(_) | Self::Closed => ErrorClass::Unclassified,
        }
    }
}

impl From<ClientError> for SessionError {
    fn from(error: ClientError) -> Self {
        match error {
            ClientError::Io(e) => Self::Connectivity(ConnectivityError::Disconnected(format!(
                "I/O error: {e}"
            ))),
            ClientError::ConnectionClosed => Self::Connectivity(ConnectivityError::Disconnected(
                "Connection closed unexpectedly".to_string(),
            )),
            ClientError::TlsError(msg) => {
                Self::Connectivity(ConnectivityError::ConnectFailed(format!("TLS: {msg}")))
            }
            ClientError::ParseError(msg) => {
                Self::Unclassified(format!("SMTP protocol parse error: {msg}"))
            }
            ClientError::MessageError(msg) => Self::Unclassified(format!("Invalid message: {msg}")),
            ClientError::Utf8Error(e) => Self::Unclassified(format!("UTF-8 decoding error: {e}")),
        }
    }
}

/// The budget passed to a delivery call was zero.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("Retry budget must allow at least one attempt")]
pub struct InvalidRetryBudget;
