//! Delivery core for outbound notifications.
//!
//! Two paths lead to a remote service:
//!
//! - [`dispatch`] sends stateless requests through a shared
//!   [`PooledTransport`], retrying server-side failures with exponential
//!   backoff and giving up immediately on client errors.
//! - [`SessionManager`] owns one authenticated session to a stateful
//!   service, checks it is alive before reuse, resets it on connectivity
//!   failures and retries with the same backoff.
//!
//! Both return a [`DeliveryOutcome`]; failures never escape as errors.
//! The [`channels`] module holds the thin adapters (SMS, Telegram, email)
//! that drive one path or the other.

pub mod channels;
mod dispatcher;
mod error;
mod outcome;
mod policy;
pub mod session;
mod transport;

pub use dispatcher::dispatch;
pub use error::{
    ConnectivityError, ErrorClass, InvalidRetryBudget, RejectionError, SessionError,
    TransportError,
};
pub use outcome::{DeliveryOutcome, STATUS_FAILED, STATUS_REJECTED, STATUS_SENT};
pub use policy::{Backoff, RetryBudget, backoff_units};
pub use session::{Connector, Session, SessionManager};
pub use transport::{HttpPool, Payload, PayloadEncoding, PooledTransport, TransportResponse};
