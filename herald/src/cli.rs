//! Command-line interface.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use herald_common::config::SmtpCredentials;
use herald_delivery::{
    Backoff, DeliveryOutcome, RetryBudget,
    channels::{
        EmailChannel, EmailMessage, NotificationChannel, SmsChannel, SmsConfig, SmsMessage,
        TelegramChannel, TelegramConfig, TelegramMessage,
    },
};

use crate::Config;

/// Send one notification and print the outcome as JSON
#[derive(Parser, Debug)]
#[command(name = "herald")]
#[command(about = "Send SMS, Telegram and email notifications", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (RON)
    #[arg(short, long, env = "HERALD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Total number of attempts, overriding the configured budget
    #[arg(short, long, value_parser = parse_budget)]
    pub retries: Option<RetryBudget>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send an SMS through sms.ru
    Sms(SmsArgs),
    /// Send a Telegram message through the Bot API
    Telegram(TelegramArgs),
    /// Send a plain-text email through the configured relay
    Email(EmailArgs),
}

#[derive(Args, Debug)]
pub struct SmsArgs {
    /// Recipient phone number, digits only
    #[arg(long)]
    pub phone: String,

    #[arg(long)]
    pub text: String,

    /// sms.ru API key
    #[arg(long, env = "HERALD_SMS_TOKEN", hide_env_values = true)]
    pub token: String,
}

#[derive(Args, Debug)]
pub struct TelegramArgs {
    #[arg(long, allow_hyphen_values = true)]
    pub chat_id: i64,

    #[arg(long)]
    pub text: String,

    /// Bot token
    #[arg(long, env = "HERALD_TELEGRAM_TOKEN", hide_env_values = true)]
    pub token: String,
}

#[derive(Args, Debug)]
pub struct EmailArgs {
    #[arg(long)]
    pub to: String,

    #[arg(long)]
    pub subject: String,

    #[arg(long)]
    pub text: String,

    /// Sender address, also the relay login
    #[arg(long, env = "GMAIL_ADDRESS")]
    pub from: String,

    #[arg(long, env = "GMAIL_APP_PASSWORD", hide_env_values = true)]
    pub password: String,
}

fn parse_budget(value: &str) -> Result<RetryBudget, String> {
    let attempts: u32 = value.parse().map_err(|e| format!("{e}"))?;
    RetryBudget::new(attempts).ok_or_else(|| "must be at least 1".to_string())
}

impl Cli {
    /// Builds the requested channel from `config`, sends the notification
    /// and closes the channel.
    pub async fn run(self, config: Config) -> anyhow::Result<DeliveryOutcome> {
        let budget = self.retries.unwrap_or(config.retries);
        let backoff = Backoff::from(config.backoff);

        let outcome = match self.command {
            Command::Sms(args) => {
                let channel = SmsChannel::with_pool(
                    SmsConfig::new(args.token).with_endpoint(config.sms_endpoint),
                    &config.pool,
                    backoff,
                )?;
                let message = SmsMessage {
                    phone_number: args.phone,
                    text: args.text,
                };
                deliver(channel, &message, budget).await
            }
            Command::Telegram(args) => {
                let channel = TelegramChannel::with_pool(
                    &TelegramConfig::new(args.token).with_api_base(config.telegram_api_base),
                    &config.pool,
                    backoff,
                )?;
                let message = TelegramMessage {
                    chat_id: args.chat_id,
                    text: args.text,
                };
                deliver(channel, &message, budget).await
            }
            Command::Email(args) => {
                let mut settings = config.smtp;
                settings.credentials = Some(SmtpCredentials::new(args.from.clone(), args.password));
                let channel = EmailChannel::new(settings, args.from, backoff);
                let message = EmailMessage {
                    to: args.to,
                    subject: args.subject,
                    text: args.text,
                };
                deliver(channel, &message, budget).await
            }
        };

        Ok(outcome)
    }
}

async fn deliver<C: NotificationChannel>(
    channel: C,
    notification: &C::Notification,
    budget: RetryBudget,
) -> DeliveryOutcome {
    let outcome = channel.send(notification, budget).await;
    channel.close().await;

    if outcome.succeeded() {
        tracing::info!(channel = channel.channel_type(), "Notification delivered");
    } else {
        tracing::warn!(
            channel = channel.channel_type(),
            status = ?outcome.status_code(),
            "Notification not delivered"
        );
    }

    outcome
}
