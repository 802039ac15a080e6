//! Mock SMTP relay for session tests
//!
//! This module provides a configurable mock SMTP server that can:
//! - Answer each command with a configured reply (success, rejection, 421)
//! - Accept `AUTH PLAIN` and `AUTH LOGIN` exchanges
//! - Inject failures (dropped connections, hangs, idle disconnects)
//! - Count connections, authentications and accepted messages
//!
//! # Example
//!
//! ```rust,no_run
//! let server = MockSmtpServer::builder()
//!     .with_rcpt_to_response(550, "5.1.1 User unknown")
//!     .build()
//!     .await?;
//! ```

use std::{
    fmt::Write,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

/// SMTP command received by the mock server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpCommand {
    Ehlo(String),
    Helo(String),
    /// Mechanism name, credentials are not kept
    Auth(String),
    MailFrom(String),
    RcptTo(String),
    Data,
    /// Message content (after DATA), dot-unstuffed
    MessageContent(String),
    Noop,
    Rset,
    Quit,
    Other(String),
}

#[derive(Debug, Clone)]
pub struct SmtpResponse {
    pub code: u16,
    pub message: String,
}

impl SmtpResponse {
    fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn to_bytes(&self) -> Vec<u8> {
        format!("{} {}\r\n", self.code, self.message).into_bytes()
    }
}

#[derive(Clone)]
struct MockServerConfig {
    greeting: SmtpResponse,
    ehlo_code: u16,
    capabilities: Vec<String>,
    helo_response: SmtpResponse,
    auth_response: SmtpResponse,
    mail_from_response: SmtpResponse,
    rcpt_to_response: SmtpResponse,
    data_response: SmtpResponse,
    data_end_response: SmtpResponse,
    noop_response: SmtpResponse,

    // Failure injection
    drop_first_connections: usize,
    close_after_messages: Option<usize>,
    hang_on_command: Option<String>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            greeting: SmtpResponse::new(220, "mock.example.com ESMTP ready"),
            ehlo_code: 250,
            capabilities: vec![
                "mock.example.com".to_string(),
                "SIZE 35882577".to_string(),
                "AUTH LOGIN PLAIN".to_string(),
            ],
            helo_response: SmtpResponse::new(250, "mock.example.com"),
            auth_response: SmtpResponse::new(235, "2.7.0 Accepted"),
            mail_from_response: SmtpResponse::new(250, "2.1.0 OK"),
            rcpt_to_response: SmtpResponse::new(250, "2.1.5 OK"),
            data_response: SmtpResponse::new(354, "Go ahead"),
            data_end_response: SmtpResponse::new(250, "2.0.0 OK queued"),
            noop_response: SmtpResponse::new(250, "2.0.0 OK"),
            drop_first_connections: 0,
            close_after_messages: None,
            hang_on_command: None,
        }
    }
}

#[derive(Default)]
struct Counters {
    connections: AtomicUsize,
    auth_attempts: AtomicUsize,
    messages: AtomicUsize,
}

/// Mock SMTP server for testing
pub struct MockSmtpServer {
    addr: SocketAddr,
    commands_received: Arc<RwLock<Vec<SmtpCommand>>>,
    counters: Arc<Counters>,
    shutdown: Arc<AtomicBool>,
}

impl MockSmtpServer {
    #[must_use]
    pub fn builder() -> MockSmtpServerBuilder {
        MockSmtpServerBuilder::new()
    }

    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub async fn commands(&self) -> Vec<SmtpCommand> {
        self.commands_received.read().await.clone()
    }

    /// Connections accepted, including the ones dropped on purpose
    pub fn connections(&self) -> usize {
        self.counters.connections.load(Ordering::SeqCst)
    }

    pub fn auth_attempts(&self) -> usize {
        self.counters.auth_attempts.load(Ordering::SeqCst)
    }

    /// Messages accepted after the end-of-data marker
    pub fn messages(&self) -> usize {
        self.counters.messages.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    #[allow(clippy::too_many_lines)]
    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        commands: Arc<RwLock<Vec<SmtpCommand>>>,
        counters: Arc<Counters>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let connection = counters.connections.fetch_add(1, Ordering::SeqCst);
        if connection < config.drop_first_connections {
            return Ok(());
        }

        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);
        let mut line = String::new();
        let mut local_messages = 0;

        writer.write_all(&config.greeting.to_bytes()).await?;

        loop {
            line.clear();
            let read = timeout(Duration::from_secs(10), reader.read_line(&mut line)).await;
            let Ok(read) = read else {
                return Ok(());
            };
            if read? == 0 {
                return Ok(());
            }

            let cmd_line = line.trim_end().to_string();
            tracing::debug!("Mock server received: {cmd_line}");

            let (verb, argument) = cmd_line.split_once(' ').unwrap_or((&cmd_line, ""));
            let verb = verb.to_uppercase();

            if config
                .hang_on_command
                .as_deref()
                .is_some_and(|hang| hang == verb)
            {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                return Ok(());
            }

            let (command, response) = match verb.as_str() {
                "EHLO" => {
                    let mut reply = String::new();
                    let last = config.capabilities.len().saturating_sub(1);
                    for (i, capability) in config.capabilities.iter().enumerate() {
                        let separator = if i == last { ' ' } else { '-' };
                        let _ = write!(reply, "{}{separator}{capability}\r\n", config.ehlo_code);
                    }
                    (SmtpCommand::Ehlo(argument.to_string()), reply.into_bytes())
                }
                "HELO" => (
                    SmtpCommand::Helo(argument.to_string()),
                    config.helo_response.to_bytes(),
                ),
                "AUTH" => {
                    counters.auth_attempts.fetch_add(1, Ordering::SeqCst);
                    let mechanism = argument
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_uppercase();
                    if mechanism == "LOGIN" {
                        for prompt in ["334 VXNlcm5hbWU6\r\n", "334 UGFzc3dvcmQ6\r\n"] {
                            writer.write_all(prompt.as_bytes()).await?;
                            line.clear();
                            if reader.read_line(&mut line).await? == 0 {
                                return Ok(());
                            }
                        }
                    }
                    (SmtpCommand::Auth(mechanism), config.auth_response.to_bytes())
                }
                "MAIL" => (
                    SmtpCommand::MailFrom(argument.to_string()),
                    config.mail_from_response.to_bytes(),
                ),
                "RCPT" => (
                    SmtpCommand::RcptTo(argument.to_string()),
                    config.rcpt_to_response.to_bytes(),
                ),
                "DATA" => (SmtpCommand::Data, config.data_response.to_bytes()),
                "NOOP" => (SmtpCommand::Noop, config.noop_response.to_bytes()),
                "RSET" => (SmtpCommand::Rset, SmtpResponse::new(250, "OK").to_bytes()),
                "QUIT" => {
                    commands.write().await.push(SmtpCommand::Quit);
                    writer
                        .write_all(&SmtpResponse::new(221, "Bye").to_bytes())
                        .await?;
                    return Ok(());
                }
                _ => (
                    SmtpCommand::Other(cmd_line.clone()),
                    SmtpResponse::new(500, "Unknown command").to_bytes(),
                ),
            };

            let is_data = command == SmtpCommand::Data;
            commands.write().await.push(command);
            writer.write_all(&response).await?;

            if is_data && config.data_response.code == 354 {
                let mut content = String::new();
                loop {
                    line.clear();
                    if reader.read_line(&mut line).await? == 0 {
                        return Ok(());
                    }
                    if line == ".\r\n" {
                        break;
                    }
                    content.push_str(line.strip_prefix('.').unwrap_or(&line));
                }

                commands
                    .write()
                    .await
                    .push(SmtpCommand::MessageContent(content));
                writer
                    .write_all(&config.data_end_response.to_bytes())
                    .await?;

                if config.data_end_response.code == 250 {
                    counters.messages.fetch_add(1, Ordering::SeqCst);
                    local_messages += 1;
                }
                if config
                    .close_after_messages
                    .is_some_and(|limit| local_messages >= limit)
                {
                    // Idle-timeout style disconnect, without a 421
                    return Ok(());
                }
            }
        }
    }
}

/// Builder for configuring a `MockSmtpServer`
pub struct MockSmtpServerBuilder {
    config: MockServerConfig,
}

impl MockSmtpServerBuilder {
    fn new() -> Self {
        Self {
            config: MockServerConfig::default(),
        }
    }

    #[must_use]
    pub fn with_greeting(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.greeting = SmtpResponse::new(code, message);
        self
    }

    /// EHLO reply code and lines; the first line is the server name
    #[must_use]
    pub fn with_ehlo_response(mut self, code: u16, capabilities: Vec<String>) -> Self {
        self.config.ehlo_code = code;
        self.config.capabilities = capabilities;
        self
    }

    #[must_use]
    pub fn with_helo_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.helo_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_auth_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.auth_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_mail_from_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.mail_from_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_rcpt_to_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.rcpt_to_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_response = SmtpResponse::new(code, message);
        self
    }

    #[must_use]
    pub fn with_data_end_response(mut self, code: u16, message: impl Into<String>) -> Self {
        self.config.data_end_response = SmtpResponse::new(code, message);
        self
    }

    /// Close the first `count` connections before the greeting
    #[must_use]
    pub const fn with_dropped_connections(mut self, count: usize) -> Self {
        self.config.drop_first_connections = count;
        self
    }

    /// Close each connection after it has accepted `count` messages
    #[must_use]
    pub const fn with_close_after_messages(mut self, count: usize) -> Self {
        self.config.close_after_messages = Some(count);
        self
    }

    /// Never answer the given command verb (e.g. `"MAIL"`)
    #[must_use]
    pub fn with_hang_on(mut self, verb: &str) -> Self {
        self.config.hang_on_command = Some(verb.to_uppercase());
        self
    }

    /// Build and start the mock SMTP server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to a port
    pub async fn build(self) -> Result<MockSmtpServer, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let commands = Arc::new(RwLock::new(Vec::new()));
        let counters = Arc::new(Counters::default());
        let shutdown = Arc::new(AtomicBool::new(false));

        let commands_clone = Arc::clone(&commands);
        let counters_clone = Arc::clone(&counters);
        let shutdown_clone = Arc::clone(&shutdown);

        tokio::spawn(async move {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                // Accept with a timeout so the shutdown flag is noticed
                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accept_result {
                    let config = Arc::clone(&config);
                    let commands = Arc::clone(&commands_clone);
                    let counters = Arc::clone(&counters_clone);

                    tokio::spawn(async move {
                        if let Err(e) =
                            MockSmtpServer::handle_client(stream, config, commands, counters).await
                        {
                            tracing::debug!("Mock server client error: {e}");
                        }
                    });
                }
            }
        });

        Ok(MockSmtpServer {
            addr,
            commands_received: commands,
            counters,
            shutdown,
        })
    }
}
