//! Notification channels.
//!
//! Each channel shapes its notification into a request and hands it to the
//! delivery core:
//! - SMS via sms.ru (form-encoded, [`dispatch`](crate::dispatch))
//! - Telegram Bot API (JSON, [`dispatch`](crate::dispatch))
//! - Email over an authenticated SMTP session ([`SessionManager`](crate::SessionManager))

mod email;
mod sms;
mod telegram;

pub use email::{EmailChannel, EmailMessage};
pub use sms::{SMS_ENDPOINT, SmsChannel, SmsConfig, SmsMessage};
pub use telegram::{TELEGRAM_API_BASE, TelegramChannel, TelegramConfig, TelegramMessage};

use async_trait::async_trait;

use crate::{DeliveryOutcome, RetryBudget};

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    type Notification: Send + Sync;

    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Deliver one notification, making at most `budget` attempts.
    async fn send(&self, notification: &Self::Notification, budget: RetryBudget)
    -> DeliveryOutcome;

    /// Release the channel's connections. Idempotent; sends afterwards fail
    /// instead of reconnecting.
    async fn close(&self);
}
