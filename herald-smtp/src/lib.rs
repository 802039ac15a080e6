//! SMTP submission client for herald.
//!
//! Only the client half of the protocol lives here: connecting to a relay,
//! securing the connection, authenticating and handing over a message. The
//! retry and connection-reuse policy built on top of it belongs to
//! `herald-delivery`.

pub mod client;

pub use client::{ClientError, MessageBuilder, Response, SmtpClient};
