//! Sizing for the shared HTTP connection pool used by stateless channels.

use std::{str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// Shared connection pool settings.
///
/// A limit of `0` means unlimited, for both the total and the per-host
/// bound.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSettings {
    /// Maximum number of requests in flight through the pool.
    ///
    /// Default: 100
    #[serde(default = "defaults::limit")]
    pub limit: usize,

    /// Maximum number of requests in flight to a single remote host.
    ///
    /// Default: 0 (unlimited)
    #[serde(default)]
    pub limit_per_host: usize,

    /// How long an idle connection is kept alive for reuse.
    ///
    /// Default: 15 seconds
    #[serde(default = "defaults::keepalive_timeout_secs")]
    pub keepalive_timeout_secs: u64,

    /// Whether server certificates are verified.
    ///
    /// Default: true
    #[serde(default = "defaults::verify_tls")]
    pub verify_tls: bool,

    /// Upper bound for a single request, connect through body.
    ///
    /// Default: 30 seconds
    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            limit: defaults::limit(),
            limit_per_host: 0,
            keepalive_timeout_secs: defaults::keepalive_timeout_secs(),
            verify_tls: defaults::verify_tls(),
            request_timeout_secs: defaults::request_timeout_secs(),
        }
    }
}

impl PoolSettings {
    #[must_use]
    pub const fn keepalive_timeout(&self) -> Duration {
        Duration::from_secs(self.keepalive_timeout_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Applies `POOL_LIMIT`, `POOL_LIMIT_PER_HOST`, `POOL_KEEPALIVE_TIMEOUT`
    /// and `POOL_SSL` overrides looked up through `lookup`.
    ///
    /// Missing or empty values leave the current setting untouched.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(limit) = parse_override(&lookup, "POOL_LIMIT")? {
            self.limit = limit;
        }
        if let Some(limit) = parse_override(&lookup, "POOL_LIMIT_PER_HOST")? {
            self.limit_per_host = limit;
        }
        if let Some(secs) = parse_override(&lookup, "POOL_KEEPALIVE_TIMEOUT")? {
            self.keepalive_timeout_secs = secs;
        }
        if let Some(value) = non_empty(&lookup, "POOL_SSL") {
            self.verify_tls = parse_flag(&value).ok_or_else(|| ConfigError::InvalidOverride {
                name: "POOL_SSL",
                value: value.clone(),
                reason: "expected a boolean".to_string(),
            })?;
        }

        Ok(self)
    }
}

fn non_empty<F>(lookup: &F, name: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_override<F, T>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty(lookup, name)
        .map(|value| {
            value.parse().map_err(|e: T::Err| ConfigError::InvalidOverride {
                name,
                value: value.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

mod defaults {
    pub const fn limit() -> usize {
        100
    }
    pub const fn keepalive_timeout_secs() -> u64 {
        15
    }
    pub const fn verify_tls() -> bool {
        true
    }
    pub const fn request_timeout_secs() -> u64 {
        30
    }
}
