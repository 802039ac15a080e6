//! Email channel over a reused, authenticated SMTP session.

use async_trait::async_trait;
use herald_common::config::{SmtpCredentials, SmtpSettings};
use herald_smtp::MessageBuilder;
use tokio::sync::Mutex;

use super::NotificationChannel;
use crate::{
    DeliveryOutcome, RetryBudget,
    outcome::STATUS_REJECTED,
    policy::Backoff,
    session::{
        SessionManager,
        smtp::{OutgoingMail, SmtpConnector},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    /// Plain-text body.
    pub text: String,
}

/// Sends plain-text mail from one sender address.
///
/// Sends share a single session and are serialized by a mutex.
pub struct EmailChannel {
    sender: String,
    manager: Mutex<SessionManager<SmtpConnector>>,
}

impl EmailChannel {
    pub fn new(settings: SmtpSettings, sender: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            sender: sender.into(),
            manager: Mutex::new(SessionManager::new(SmtpConnector::new(settings), backoff)),
        }
    }

    /// Gmail submission (`smtp.gmail.com:587`, STARTTLS) with an app
    /// password; the address is both the login and the sender.
    pub fn gmail(
        address: impl Into<String>,
        app_password: impl Into<String>,
        backoff: Backoff,
    ) -> Self {
        let address = address.into();
        let settings = gmail_settings(&address, app_password.into());
        Self::new(settings, address, backoff)
    }

    fn render(&self, message: &EmailMessage) -> Result<OutgoingMail, herald_smtp::ClientError> {
        let content = MessageBuilder::new()
            .from(self.sender.as_str())
            .to(message.to.as_str())
            .subject(message.subject.as_str())
            .body(message.text.as_str())
            .build()?;

        Ok(OutgoingMail {
            sender: self.sender.clone(),
            recipients: vec![message.to.clone()],
            content,
        })
    }
}

fn gmail_settings(address: &str, app_password: String) -> SmtpSettings {
    SmtpSettings {
        credentials: Some(SmtpCredentials::new(address, app_password)),
        ..SmtpSettings::default()
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    type Notification = EmailMessage;

    fn channel_type(&self) -> &'static str {
        "email"
    }

    async fn send(&self, message: &EmailMessage, budget: RetryBudget) -> DeliveryOutcome {
        let mail = match self.render(message) {
            Ok(mail) => mail,
            Err(error) => {
                tracing::warn!(%error, "Refusing to send malformed message");
                return DeliveryOutcome::failure(Some(STATUS_REJECTED), error.to_string());
            }
        };

        self.manager.lock().await.send(&mail, budget).await
    }

    async fn close(&self) {
        self.manager.lock().await.close().await;
    }
}
