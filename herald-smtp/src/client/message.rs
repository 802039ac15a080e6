//! RFC 5322 message assembly for plain-text notifications.

use std::fmt::Write;

use base64::{Engine, engine::general_purpose::STANDARD};
use chrono::Utc;

use super::error::{ClientError, Result};

/// Builder for a single-part `text/plain; charset=utf-8` message.
///
/// `Date` and `Message-ID` are filled in at build time unless set
/// explicitly through [`MessageBuilder::header`]. Non-ASCII subjects are
/// encoded as RFC 2047 words and non-ASCII bodies are sent as base64.
///
/// # Examples
///
/// ```
/// use herald_smtp::MessageBuilder;
///
/// let message = MessageBuilder::new()
///     .from("sender@example.com")
///     .to("recipient@example.com")
///     .subject("Hello")
///     .body("This is the message body")
///     .build()
///     .unwrap();
/// assert!(message.contains("Subject: Hello\r\n"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MessageBuilder {
    from: Option<String>,
    to: Vec<String>,
    subject: Option<String>,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl MessageBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from(mut self, email: impl Into<String>) -> Self {
        self.from = Some(email.into());
        self
    }

    /// Adds a recipient to the To header.
    #[must_use]
    pub fn to(mut self, email: impl Into<String>) -> Self {
        self.to.push(email.into());
        self
    }

    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Adds a custom header, written after the standard ones.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn body(mut self, content: impl Into<String>) -> Self {
        self.body = Some(content.into());
        self
    }

    /// Renders the message with CRLF line endings.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::MessageError` when the sender or every recipient
    /// is missing, or a header would contain a line break.
    pub fn build(self) -> Result<String> {
        let from = self
            .from
            .ok_or_else(|| ClientError::MessageError("Missing From address".to_string()))?;
        if self.to.is_empty() {
            return Err(ClientError::MessageError("No recipients".to_string()));
        }

        let mut headers = vec![
            ("From".to_string(), from.clone()),
            ("To".to_string(), self.to.join(", ")),
        ];
        if let Some(subject) = &self.subject {
            headers.push(("Subject".to_string(), encode_header_word(subject)));
        }
        if !has_header(&self.headers, "Date") {
            headers.push(("Date".to_string(), Utc::now().to_rfc2822()));
        }
        if !has_header(&self.headers, "Message-ID") {
            headers.push(("Message-ID".to_string(), message_id(&from)));
        }
        headers.extend(self.headers);

        let body = self.body.unwrap_or_default();
        let (encoding, body) = if body.is_ascii() {
            ("7bit", body)
        } else {
            ("base64", wrap_base64(body.as_bytes()))
        };
        headers.push(("MIME-Version".to_string(), "1.0".to_string()));
        headers.push((
            "Content-Type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        ));
        headers.push(("Content-Transfer-Encoding".to_string(), encoding.to_string()));

        let mut message = String::with_capacity(512 + body.len());
        for (name, value) in &headers {
            if name.contains(['\r', '\n']) || value.contains(['\r', '\n']) {
                return Err(ClientError::MessageError(format!(
                    "Header {name} contains a line break"
                )));
            }
            let _ = write!(message, "{name}: {value}\r\n");
        }
        message.push_str("\r\n");
        message.push_str(&body);

        Ok(message)
    }
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
}

/// `<ULID@domain>`, taking the domain from the sender address.
fn message_id(from: &str) -> String {
    let domain = from
        .rsplit_once('@')
        .map_or("localhost", |(_, domain)| domain.trim_end_matches('>'));
    format!("<{}@{domain}>", ulid::Ulid::new())
}

/// RFC 2047 `B` encoding for header values that are not plain ASCII.
fn encode_header_word(value: &str) -> String {
    if value.is_ascii() {
        value.to_string()
    } else {
        format!("=?utf-8?b?{}?=", STANDARD.encode(value))
    }
}

/// Base64 with lines wrapped at 76 characters.
fn wrap_base64(data: &[u8]) -> String {
    let encoded = STANDARD.encode(data);
    let mut out = String::with_capacity(encoded.len() + encoded.len() / 38);
    for chunk in encoded.as_bytes().chunks(76) {
        // Base64 output is pure ASCII.
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push_str("\r\n");
    }
    out
}
