//! SMTP client implementation.
//!
//! The client is deliberately low level: each method writes one command and
//! returns the server's reply, leaving the interpretation of reply codes to
//! the caller. It supports:
//!
//! - Plain TCP, implicit TLS and STARTTLS upgrades
//! - `AUTH PLAIN` and `AUTH LOGIN`
//! - `NOOP` for liveness checks on a reused connection
//! - Dot-stuffed message transfer
//!
//! # Examples
//!
//! ```no_run
//! use herald_smtp::{MessageBuilder, SmtpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = SmtpClient::connect("localhost:2525", "localhost".to_string()).await?;
//! client.read_greeting().await?;
//! client.ehlo("client.example.com").await?;
//! client.auth_plain("user", "secret").await?;
//!
//! let message = MessageBuilder::new()
//!     .from("sender@example.com")
//!     .to("recipient@example.com")
//!     .subject("Hello")
//!     .body("Hello World")
//!     .build()?;
//!
//! client.mail_from("sender@example.com").await?;
//! client.rcpt_to("recipient@example.com").await?;
//! client.data().await?;
//! client.send_data(&message).await?;
//! client.quit().await?;
//! # Ok(())
//! # }
//! ```

mod error;
mod message;
mod response;
mod smtp_client;

pub use error::{ClientError, Result};
pub use message::MessageBuilder;
pub use response::{Response, ResponseLine};
pub use smtp_client::SmtpClient;
