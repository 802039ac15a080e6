//! Configuration types for herald.
//!
//! ## Modules
//!
//! - [`pool`]: sizing and keep-alive for the shared HTTP connection pool
//! - [`smtp`]: mail relay endpoint, credentials and TLS mode
//! - [`timeouts`]: per-operation timeouts for the SMTP session
//! - [`backoff`]: the time-unit used by exponential backoff

pub mod backoff;
pub mod pool;
pub mod smtp;
pub mod timeouts;

use thiserror::Error;

pub use backoff::BackoffSettings;
pub use pool::PoolSettings;
pub use smtp::{SmtpCredentials, SmtpSettings, TlsMode};
pub use timeouts::ClientTimeouts;

/// Errors raised while applying configuration overrides.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// An override variable was present but could not be parsed.
    #[error("Invalid value for {name}: '{value}' ({reason})")]
    InvalidOverride {
        name: &'static str,
        value: String,
        reason: String,
    },
}
