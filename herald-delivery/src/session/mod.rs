//! Reusable authenticated sessions to stateful services.
//!
//! A [`SessionManager`] owns at most one live [`Session`], produced by a
//! [`Connector`]. The SMTP implementation lives in [`smtp`].

mod manager;
pub mod smtp;

use async_trait::async_trait;

pub use manager::SessionManager;

use crate::error::SessionError;

/// One live, authenticated connection.
#[async_trait]
pub trait Session: Send {
    type Message: Send + Sync;

    /// Cheap liveness check run before every reuse.
    async fn probe(&mut self) -> Result<(), SessionError>;

    /// Transmits one message over the session.
    async fn transmit(&mut self, message: &Self::Message) -> Result<(), SessionError>;

    /// Graceful goodbye. The session is dropped afterwards either way.
    async fn terminate(self) -> Result<(), SessionError>;
}

/// Opens and authenticates new sessions.
#[async_trait]
pub trait Connector: Send + Sync {
    type Session: Session;

    async fn establish(&self) -> Result<Self::Session, SessionError>;
}
