//! Scripted HTTP endpoint for dispatch tests
//!
//! Each request is answered with the next scripted reply (the last one
//! repeats) and recorded. Every response carries `Connection: close`.

use std::{
    collections::VecDeque,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::Mutex,
    time::timeout,
};

/// One request as the server saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

impl CapturedRequest {
    /// `application/x-www-form-urlencoded` fields, in wire order
    pub fn form_fields(&self) -> Vec<(String, String)> {
        self.body
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(name, value)| (name.to_string(), value.replace('+', " ")))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct Reply {
    status: u16,
    body: String,
}

#[derive(Default)]
struct State {
    script: VecDeque<Reply>,
    last: Option<Reply>,
    requests: Vec<CapturedRequest>,
}

pub struct MockHttpServer {
    addr: SocketAddr,
    state: Arc<Mutex<State>>,
    shutdown: Arc<AtomicBool>,
}

impl MockHttpServer {
    /// Starts a server answering with `replies` in order
    pub async fn start(replies: &[(u16, &str)]) -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let state = Arc::new(Mutex::new(State {
            script: replies
                .iter()
                .map(|&(status, body)| Reply {
                    status,
                    body: body.to_string(),
                })
                .collect(),
            ..State::default()
        }));
        let shutdown = Arc::new(AtomicBool::new(false));

        let state_clone = Arc::clone(&state);
        let shutdown_clone = Arc::clone(&shutdown);
        tokio::spawn(async move {
            while !shutdown_clone.load(Ordering::Relaxed) {
                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;
                if let Ok(Ok((stream, _peer))) = accept_result {
                    let state = Arc::clone(&state_clone);
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle(stream, state).await {
                            tracing::debug!("Mock HTTP client error: {e}");
                        }
                    });
                }
            }
        });

        Ok(Self {
            addr,
            state,
            shutdown,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.state.lock().await.requests.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle(mut stream: TcpStream, state: Arc<Mutex<State>>) -> std::io::Result<()> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        let header_end = loop {
            if let Some(position) = buffer.windows(4).position(|w| w == b"\r\n\r\n") {
                break position + 4;
            }
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buffer.extend_from_slice(&chunk[..n]);
        };

        let head = String::from_utf8_lossy(&buffer[..header_end]).into_owned();
        let mut lines = head.split("\r\n");
        let mut request_line = lines.next().unwrap_or_default().split(' ');
        let method = request_line.next().unwrap_or_default().to_string();
        let path = request_line.next().unwrap_or_default().to_string();

        let mut content_length = 0;
        let mut content_type = None;
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                let value = value.trim();
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.parse().unwrap_or(0);
                } else if name.eq_ignore_ascii_case("content-type") {
                    content_type = Some(value.to_string());
                }
            }
        }

        while buffer.len() < header_end + content_length {
            let n = stream.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..n]);
        }
        let body_end = buffer.len().min(header_end + content_length);
        let body = String::from_utf8_lossy(&buffer[header_end..body_end]).into_owned();

        let reply = {
            let mut state = state.lock().await;
            state.requests.push(CapturedRequest {
                method,
                path,
                content_type,
                body,
            });
            let next = state.script.pop_front().or_else(|| state.last.clone());
            state.last.clone_from(&next);
            next.unwrap_or(Reply {
                status: 500,
                body: String::new(),
            })
        };

        let response = format!(
            "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            reply.status,
            reply.body.len(),
            reply.body
        );
        stream.write_all(response.as_bytes()).await?;
        stream.shutdown().await
    }
}
