//! SMS via the sms.ru HTTP API.

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

pub const SMS_ENDPOINT: &str = "https://sms.ru/sms/send";

/// SMS channel configuration.
#[derive(Clone)]
pub struct SmsConfig {
    /// sms.ru `api_id`.
    pub token: String,
    pub endpoint: String,
}

impl SmsConfig {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            endpoint: SMS_ENDPOINT.to_string(),
        }
    }

    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl fmt::Debug for SmsConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmsConfig")
            .field("token", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsMessage {
    pub phone_number: String,
    pub text: String,
}

pub struct SmsChannel<T = HttpPool> {
    config: SmsConfig,
    transport: T,
    backoff: Backoff,
}

impl SmsChannel<HttpPool> {
    /// Creates the channel with its own HTTP pool.
    pub fn with_pool(
        config: SmsConfig,
        pool: &PoolSettings,
        backoff: Backoff,
    ) -> Result<Self, TransportError> {
        Ok(Self::new(config, HttpPool::new(pool)?, backoff))
    }
}

impl<T: PooledTransport> SmsChannel<T> {
    pub const fn new(config: SmsConfig, transport: T, backoff: Backoff) -> Self {
        Self {
            config,
            transport,
            backoff,
        }
    }

    fn payload(&self, message: &SmsMessage) -> Payload {
        let mut payload = Payload::new();
        payload.insert("api_id".to_string(), Value::from(self.config.token.as_str()));
        payload.insert("to".to_string(), Value::from(message.phone_number.as_str()));
        payload.insert("msg".to_string(), Value::from(message.text.as_str()));
        // Ask for a JSON reply.
        payload.insert("json".to_string(), Value::from(1));
        payload
    }
}

#[async_trait]
impl<T: PooledTransport> NotificationChannel for SmsChannel<T> {
    type Notification = SmsMessage;

    fn channel_type(&self) -> &'static str {
        "sms"
    }

    async fn send(&self, message: &SmsMessage, budget: RetryBudget) -> DeliveryOutcome {
        dispatch(
            &self.config.endpoint,
            PayloadEncoding::Form,
            &self.payload(message),
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
