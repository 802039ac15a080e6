//! Command-line front end for the herald delivery core.
//!
//! Configuration is resolved once at startup from a RON file and the
//! process environment, then injected into the channels; the delivery core
//! itself never reads the environment.

pub mod cli;

use std::path::{Path, PathBuf};

use herald_common::config::{BackoffSettings, PoolSettings, SmtpSettings};
use herald_delivery::{
    RetryBudget,
    channels::{SMS_ENDPOINT, TELEGRAM_API_BASE},
};
use serde::{Deserialize, Serialize};

/// Name of the configuration file looked up in the default locations.
pub const CONFIG_FILE_NAME: &str = "herald.config.ron";

/// Everything `herald` reads from its configuration file.
///
/// Every field has a default, so an empty `()` file is valid and a missing
/// file is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Attempts per notification unless `--retries` is given.
    ///
    /// Default: 3
    #[serde(default)]
    pub retries: RetryBudget,

    #[serde(default)]
    pub backoff: BackoffSettings,

    /// Shared HTTP pool for the SMS and Telegram channels.
    #[serde(default)]
    pub pool: PoolSettings,

    /// Mail relay; credentials are taken from the environment.
    #[serde(default)]
    pub smtp: SmtpSettings,

    /// Default: `https://sms.ru/sms/send`
    #[serde(default = "defaults::sms_endpoint")]
    pub sms_endpoint: String,

    /// Default: `https://api.telegram.org`
    #[serde(default = "defaults::telegram_api_base")]
    pub telegram_api_base: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retries: RetryBudget::default(),
            backoff: BackoffSettings::default(),
            pool: PoolSettings::default(),
            smtp: SmtpSettings::default(),
            sms_endpoint: defaults::sms_endpoint(),
            telegram_api_base: defaults::telegram_api_base(),
        }
    }
}

impl Config {
    /// Parses a RON document.
    pub fn from_ron(content: &str) -> anyhow::Result<Self> {
        Ok(ron::from_str(content)?)
    }

    /// Loads the configuration.
    ///
    /// An explicit path (`--config` or `HERALD_CONFIG`) must exist. Otherwise
    /// the default locations are tried in order and, when none exists, the
    /// built-in defaults are used.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match find_config_file(explicit, &default_paths())? {
            Some(path) => {
                let content = std::fs::read_to_string(&path).map_err(|e| {
                    anyhow::anyhow!("Failed to read config from {}: {}", path.display(), e)
                })?;
                tracing::debug!("Loaded configuration from {}", path.display());
                Self::from_ron(&content)
                    .map_err(|e| anyhow::anyhow!("Invalid config in {}: {}", path.display(), e))
            }
            None => {
                tracing::debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }
}

/// Default locations, in order of precedence:
/// 1. `./herald.config.ron` (current working directory)
/// 2. `/etc/herald/herald.config.ron` (system-wide config)
pub fn default_paths() -> Vec<PathBuf> {
    vec![
        PathBuf::from(".").join(CONFIG_FILE_NAME),
        PathBuf::from("/etc/herald").join(CONFIG_FILE_NAME),
    ]
}

/// Finds the configuration file.
///
/// `explicit` wins and must point to an existing file. Otherwise the first
/// existing entry of `candidates` is returned, or `None`.
pub fn find_config_file(
    explicit: Option<&Path>,
    candidates: &[PathBuf],
) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        anyhow::bail!("Config file does not exist: {}", path.display());
    }

    Ok(candidates.iter().find(|path| path.exists()).cloned())
}

mod defaults {
    use super::{SMS_ENDPOINT, TELEGRAM_API_BASE};

    pub fn sms_endpoint() -> String {
        SMS_ENDPOINT.to_string()
    }
    pub fn telegram_api_base() -> String {
        TELEGRAM_API_BASE.to_string()
    }
}
