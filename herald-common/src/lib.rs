//! Shared building blocks for the herald workspace.
//!
//! Configuration structs are plain `serde` types resolved once at process
//! startup and injected into the delivery core; nothing in here reads the
//! process environment on its own except [`logging::init`].

pub mod config;
pub mod logging;

pub use tracing;
