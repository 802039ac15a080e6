//! Mail relay settings for the stateful SMTP channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ClientTimeouts;

/// How the transport is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TlsMode {
    /// Plaintext for the whole session. Only sensible against local relays.
    None,
    /// TLS from the first byte (SMTPS, usually port 465).
    Implicit,
    /// Plaintext greeting, then upgraded with STARTTLS (usually port 587).
    #[default]
    StartTls,
}

/// Login for the relay. The password never appears in `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpCredentials {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl SmtpCredentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for SmtpCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SmtpSettings {
    /// Relay hostname, also used as the TLS server name.
    ///
    /// Default: `smtp.gmail.com`
    #[serde(default = "defaults::host")]
    pub host: String,

    /// Default: 587
    #[serde(default = "defaults::port")]
    pub port: u16,

    /// Default: [`TlsMode::StartTls`]
    #[serde(default)]
    pub tls: TlsMode,

    /// Skip certificate verification. Testing only.
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Name announced in EHLO/HELO.
    ///
    /// Default: `localhost`
    #[serde(default = "defaults::helo_name")]
    pub helo_name: String,

    /// Relay login; when absent the session is not authenticated.
    #[serde(default)]
    pub credentials: Option<SmtpCredentials>,

    #[serde(default)]
    pub timeouts: ClientTimeouts,
}

impl Default for SmtpSettings {
    fn default() -> Self {
        Self {
            host: defaults::host(),
            port: defaults::port(),
            tls: TlsMode::default(),
            accept_invalid_certs: false,
            helo_name: defaults::helo_name(),
            credentials: None,
            timeouts: ClientTimeouts::default(),
        }
    }
}

impl SmtpSettings {
    /// `host:port` as handed to the socket layer.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

mod defaults {
    pub fn host() -> String {
        "smtp.gmail.com".to_string()
    }
    pub const fn port() -> u16 {
        587
    }
    pub fn helo_name() -> String {
        "localhost".to_string()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_target_gmail_submission() {
        let settings = SmtpSettings::default();
        assert_eq!(settings.address(), "smtp.gmail.com:587");
        assert_eq!(settings.tls, TlsMode::StartTls);
        assert!(settings.credentials.is_none());
    }

    #[test]
    fn test_password_is_redacted() {
        let credentials = SmtpCredentials::new("me@example.com", "hunter2");
        let debug = format!("{credentials:?}");
        assert!(debug.contains("me@example.com"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_from_ron() {
        let settings: SmtpSettings = ron::from_str(
            r#"(host: "127.0.0.1", port: 2525, tls: None, credentials: Some((username: "u", password: "p")))"#,
        )
        .unwrap();
        assert_eq!(settings.address(), "127.0.0.1:2525");
        assert_eq!(settings.tls, TlsMode::None);
        assert_eq!(settings.credentials, Some(SmtpCredentials::new("u", "p")));
        assert_eq!(settings.helo_name, "localhost");
    }
}
