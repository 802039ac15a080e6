//! Telegram Bot API channel.
//!
//! Sends plain text messages via `POST /bot<token>/sendMessage`.

use std::fmt;

use async_trait::async_trait;
use herald_common::config::PoolSettings;
use serde_json::Value;

use super::NotificationChannel;
use crate::{
    DeliveryOutcome, RetryBudget, dispatch,
    error::TransportError,
    policy::Backoff,
    transport::{HttpPool, Payload, PayloadEncoding, PooledTransport},
};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram channel configuration.
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot API token.
    pub token: String,
    /// Bot API root, without a trailing slash.
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            api_base: TELEGRAM_API_BASE.to_string(),
        }
    }

    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.api_base.trim_end_matches('/'),
            self.token
        )
    }
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &"<redacted>")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramMessage {
    /// User, group or channel id.
    pub chat_id: i64,
    pub text: String,
}

pub struct TelegramChannel<T = HttpPool> {
    url: String,
    transport: T,
    backoff: Backoff,
}

impl TelegramChannel<HttpPool> {
    /// Creates the channel with its own HTTP pool.
    pub fn with_pool(
        config: &TelegramConfig,
        pool: &PoolSettings,
        backoff: Backoff,
    ) -> Result<Self, TransportError> {
        Ok(Self::new(config, HttpPool::new(pool)?, backoff))
    }
}

impl<T: PooledTransport> TelegramChannel<T> {
    pub fn new(config: &TelegramConfig, transport: T, backoff: Backoff) -> Self {
        Self {
            url: config.send_message_url(),
            transport,
            backoff,
        }
    }
}

fn payload(message: &TelegramMessage) -> Payload {
    let mut payload = Payload::new();
    payload.insert("chat_id".to_string(), Value::from(message.chat_id));
    payload.insert("text".to_string(), Value::from(message.text.as_str()));
    payload
}

#[async_trait]
impl<T: PooledTransport> NotificationChannel for TelegramChannel<T> {
    type Notification = TelegramMessage;

    fn channel_type(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, message: &TelegramMessage, budget: RetryBudget) -> DeliveryOutcome {
        dispatch(
            &self.url,
            PayloadEncoding::Json,
            &payload(message),
            budget,
            self.backoff,
            &self.transport,
        )
        .await
    }

    async fn close(&self) {
        self.transport.close().await;
    }
}
