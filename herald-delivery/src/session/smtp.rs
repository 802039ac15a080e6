//! SMTP sessions for the connection manager.
//!
//! [`SmtpConnector`] opens a connection, negotiates TLS and authenticates;
//! [`SmtpSession`] runs one MAIL/RCPT/DATA transaction per message. Every
//! network operation is bounded by the configured [`ClientTimeouts`], and
//! an elapsed timeout is a connectivity failure.

use std::time::Duration;

use async_trait::async_trait;
use herald_common::config::{ClientTimeouts, SmtpSettings, TlsMode};
use herald_smtp::{ClientError, Response, SmtpClient};

use super::{Connector, Session};
use crate::error::{ConnectivityError, RejectionError, SessionError};

/// Reply code for "service not available, closing transmission channel".
const SERVICE_CLOSING: u16 = 421;

/// A message ready for submission: envelope plus rendered content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub sender: String,
    pub recipients: Vec<String>,
    /// RFC 5322 message, headers and body.
    pub content: String,
}

/// Establishes authenticated SMTP sessions to one relay.
#[derive(Debug, Clone)]
pub struct SmtpConnector {
    settings: SmtpSettings,
}

impl SmtpConnector {
    pub const fn new(settings: SmtpSettings) -> Self {
        Self { settings }
    }

    async fn open(&self) -> Result<SmtpClient, SessionError> {
        let settings = &self.settings;
        let address = settings.address();

        let connect = async {
            let client = match settings.tls {
                TlsMode::Implicit => {
                    SmtpClient::connect_tls(
                        &address,
                        settings.host.clone(),
                        settings.accept_invalid_certs,
                    )
                    .await
                }
                TlsMode::None | TlsMode::StartTls => {
                    SmtpClient::connect(&address, settings.host.clone())
                        .await
                        .map(|client| client.accept_invalid_certs(settings.accept_invalid_certs))
                }
            };
            client.map_err(|e| match e {
                ClientError::Io(e) => {
                    ConnectivityError::ConnectFailed(format!("Failed to connect to {address}: {e}"))
                        .into()
                }
                other => SessionError::from(other),
            })
        };

        timed(settings.timeouts.connect(), "Connect", connect).await
    }

    /// `EHLO`, falling back to `HELO` when the server does not speak ESMTP.
    async fn greet(&self, client: &mut SmtpClient) -> Result<Response, SessionError> {
        let settings = &self.settings;
        let limit = settings.timeouts.command();

        let ehlo = timed(limit, "EHLO", client.ehlo(&settings.helo_name)).await?;
        if ehlo.is_success() {
            return Ok(ehlo);
        }
        if ehlo.code == SERVICE_CLOSING || !ehlo.is_permanent_error() {
            return Err(refused("EHLO", &ehlo, SessionError::Unclassified));
        }

        tracing::debug!(code = ehlo.code, "EHLO refused, falling back to HELO");
        let helo = timed(limit, "HELO", client.helo(&settings.helo_name)).await?;
        if helo.is_success() {
            Ok(helo)
        } else {
            Err(refused("HELO", &helo, SessionError::Unclassified))
        }
    }
}

#[async_trait]
impl Connector for SmtpConnector {
    type Session = SmtpSession;

    #[tracing::instrument(skip(self), fields(server = %self.settings.address(), tls = ?self.settings.tls))]
    async fn establish(&self) -> Result<SmtpSession, SessionError> {
        let settings = &self.settings;
        let limit = settings.timeouts.command();

        if settings.accept_invalid_certs && settings.tls != TlsMode::None {
            tracing::warn!("SECURITY WARNING: TLS certificate validation is disabled");
        }

        let mut client = self.open().await?;

        let greeting = timed(limit, "Greeting", client.read_greeting()).await?;
        if greeting.code != 220 {
            return Err(refused("Greeting", &greeting, SessionError::Unclassified));
        }

        let mut capabilities = self.greet(&mut client).await?;

        if settings.tls == TlsMode::StartTls {
            if !capabilities.has_extension("STARTTLS") {
                return Err(SessionError::Unclassified(
                    "Server does not advertise STARTTLS".to_string(),
                ));
            }
            let response = timed(limit, "STARTTLS", client.starttls()).await?;
            if !response.is_success() {
                return Err(refused("STARTTLS", &response, SessionError::Unclassified));
            }
            tracing::debug!("TLS negotiated via STARTTLS");
            capabilities = self.greet(&mut client).await?;
        }

        if let Some(credentials) = &settings.credentials {
            let mechanisms = capabilities.extension_params("AUTH").unwrap_or_default();
            let login_only = mechanisms.iter().any(|m| m == "LOGIN")
                && !mechanisms.iter().any(|m| m == "PLAIN");

            let response = if login_only {
                timed(
                    limit,
                    "AUTH LOGIN",
                    client.auth_login(&credentials.username, &credentials.password),
                )
                .await?
            } else {
                timed(
                    limit,
                    "AUTH PLAIN",
                    client.auth_plain(&credentials.username, &credentials.password),
                )
                .await?
            };

            if response.code != 235 {
                return Err(refused("AUTH", &response, |reason| {
                    RejectionError::Authentication(reason).into()
                }));
            }
            tracing::debug!(username = %credentials.username, "Authenticated");
        }

        Ok(SmtpSession {
            client,
            timeouts: settings.timeouts.clone(),
        })
    }
}

/// One authenticated SMTP connection.
pub struct SmtpSession {
    client: SmtpClient,
    timeouts: ClientTimeouts,
}

impl SmtpSession {
    /// Clears a half-finished transaction so the session can be reused.
    async fn abort_transaction(&mut self) {
        if let Err(error) = timed(self.timeouts.command(), "RSET", self.client.rset()).await {
            tracing::debug!(%error, "Ignoring failed RSET");
        }
    }
}

#[async_trait]
impl Session for SmtpSession {
    type Message = OutgoingMail;

    async fn probe(&mut self) -> Result<(), SessionError> {
        let response = timed(self.timeouts.command(), "NOOP", self.client.noop()).await?;
        if response.code == 250 {
            Ok(())
        } else {
            Err(refused("NOOP", &response, |reason| {
                ConnectivityError::Disconnected(reason).into()
            }))
        }
    }

    async fn transmit(&mut self, mail: &OutgoingMail) -> Result<(), SessionError> {
        let limit = self.timeouts.command();

        if mail.recipients.is_empty() {
            return Err(SessionError::Unclassified("No recipients".to_string()));
        }

        let response = timed(limit, "MAIL FROM", self.client.mail_from(&mail.sender)).await?;
        if !response.is_success() {
            let error = refused("MAIL FROM", &response, |reason| {
                RejectionError::Sender(format!("{}: {reason}", mail.sender)).into()
            });
            self.abort_transaction().await;
            return Err(error);
        }

        let mut rejected = Vec::new();
        for recipient in &mail.recipients {
            let response = timed(limit, "RCPT TO", self.client.rcpt_to(recipient)).await?;
            if response.code == SERVICE_CLOSING {
                return Err(refused("RCPT TO", &response, SessionError::Unclassified));
            }
            if !response.is_success() {
                rejected.push(format!(
                    "{recipient}: {} {}",
                    response.code,
                    response.message()
                ));
            }
        }

        if rejected.len() == mail.recipients.len() {
            self.abort_transaction().await;
            return Err(RejectionError::Recipient(rejected.join("; ")).into());
        }
        if !rejected.is_empty() {
            tracing::warn!(?rejected, "Some recipients were refused");
        }

        let response = timed(limit, "DATA", self.client.data()).await?;
        if response.code != 354 {
            let error = refused("DATA", &response, SessionError::Unclassified);
            self.abort_transaction().await;
            return Err(error);
        }

        let response = timed(
            self.timeouts.data(),
            "Message data",
            self.client.send_data(&mail.content),
        )
        .await?;
        if !response.is_success() {
            return Err(refused("Message data", &response, SessionError::Unclassified));
        }

        tracing::debug!(recipients = mail.recipients.len() - rejected.len(), "Message accepted");
        Ok(())
    }

    async fn terminate(mut self) -> Result<(), SessionError> {
        timed(self.timeouts.quit(), "QUIT", self.client.quit())
            .await
            .map(|_| ())
    }
}

/// Bounds `operation` by `limit`; running out of time is a connectivity
/// failure.
async fn timed<T, E, F>(limit: Duration, operation: &str, future: F) -> Result<T, SessionError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<SessionError>,
{
    tokio::time::timeout(limit, future)
        .await
        .map_err(|_| ConnectivityError::Timeout(format!("{operation} timed out after {limit:?}")))?
        .map_err(Into::into)
}

/// Error for a negative reply. A 421 is always a connectivity failure;
/// anything else is classified by `classify`.
fn refused<F>(stage: &str, response: &Response, classify: F) -> SessionError
where
    F: FnOnce(String) -> SessionError,
{
    let reason = format!("{stage} refused: {} {}", response.code, response.message());
    if response.code == SERVICE_CLOSING {
        ConnectivityError::ServiceUnavailable(reason).into()
    } else {
        classify(reason)
    }
}
