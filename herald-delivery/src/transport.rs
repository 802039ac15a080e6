//! Shared pooled HTTP transport for stateless channels.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use herald_common::config::PoolSettings;
use parking_lot::RwLock;
use reqwest::{Client, Url};
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::TransportError;

/// Field name to value mapping sent as the request body.
pub type Payload = serde_json::Map<String, Value>;

/// How a [`Payload`] is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadEncoding {
    /// `application/json`
    Json,
    /// `application/x-www-form-urlencoded`
    Form,
}

/// A response that made it back, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Decoded JSON, the raw text if it was not JSON, `null` if empty.
    pub body: Value,
}

/// A long-lived, shareable request pool.
///
/// Implementations are borrowed by many concurrent sends; requests on one
/// transport may run in parallel.
#[async_trait]
pub trait PooledTransport: Send + Sync {
    /// Issues one POST to `target`.
    async fn post(
        &self,
        target: &str,
        encoding: PayloadEncoding,
        payload: &Payload,
    ) -> Result<TransportResponse, TransportError>;

    /// Releases pooled connections. Idempotent; later posts fail with
    /// [`TransportError::Closed`].
    async fn close(&self);

    fn is_closed(&self) -> bool;
}

/// [`PooledTransport`] over a `reqwest` client.
///
/// `reqwest` pools idle connections per host but has no bound on in-flight
/// requests, so the total and per-host limits are semaphores.
pub struct HttpPool {
    client: RwLock<Option<Client>>,
    total: Option<Arc<Semaphore>>,
    per_host: DashMap<String, Arc<Semaphore>>,
    limit_per_host: usize,
}

impl HttpPool {
    pub fn new(settings: &PoolSettings) -> Result<Self, TransportError> {
        let mut builder = Client::builder()
            .pool_idle_timeout(settings.keepalive_timeout())
            .timeout(settings.request_timeout())
            .danger_accept_invalid_certs(!settings.verify_tls);
        if settings.limit_per_host > 0 {
            builder = builder.pool_max_idle_per_host(settings.limit_per_host);
        }
        let client = builder.build()?;

        tracing::debug!(
            limit = settings.limit,
            limit_per_host = settings.limit_per_host,
            keepalive_secs = settings.keepalive_timeout_secs,
            verify_tls = settings.verify_tls,
            "HTTP pool created"
        );

        Ok(Self {
            client: RwLock::new(Some(client)),
            total: limit_semaphore(settings.limit),
            per_host: DashMap::new(),
            limit_per_host: settings.limit_per_host,
        })
    }

    async fn acquire(
        semaphore: Option<Arc<Semaphore>>,
    ) -> Result<Option<OwnedSemaphorePermit>, TransportError> {
        match semaphore {
            Some(semaphore) => semaphore
                .acquire_owned()
                .await
                .map(Some)
                .map_err(|_| TransportError::Closed),
            None => Ok(None),
        }
    }

    fn host_limit(&self, host: &str) -> Option<Arc<Semaphore>> {
        if self.limit_per_host == 0 {
            return None;
        }
        let limit = self.limit_per_host;
        Some(Arc::clone(&self.per_host.entry(host.to_string()).or_insert_with(
            || Arc::new(Semaphore::new(limit.min(Semaphore::MAX_PERMITS))),
        )))
    }
}

fn limit_semaphore(limit: usize) -> Option<Arc<Semaphore>> {
    (limit > 0).then(|| Arc::new(Semaphore::new(limit.min(Semaphore::MAX_PERMITS))))
}

#[async_trait]
impl PooledTransport for HttpPool {
    async fn post(
        &self,
        target: &str,
        encoding: PayloadEncoding,
        payload: &Payload,
    ) -> Result<TransportResponse, TransportError> {
        let client = self.client.read().clone().ok_or(TransportError::Closed)?;
        let url = Url::parse(target).map_err(|e| TransportError::Request {
            status: None,
            message: format!("Invalid target URL: {e}"),
        })?;

        let _total = Self::acquire(self.total.clone()).await?;
        let _host = Self::acquire(url.host_str().and_then(|host| self.host_limit(host))).await?;

        let request = client.post(url);
        let request = match encoding {
            PayloadEncoding::Json => request.json(payload),
            PayloadEncoding::Form => request.form(payload),
        };

        let response = request.send().await?;
        let status = response.status().as_u16();
        // The status decides the outcome even when the body is cut short.
        let body = match response.bytes().await {
            Ok(body) => decode_body(&body),
            Err(error) => {
                let error = error.without_url();
                tracing::debug!(status, %error, "Failed to read response body");
                Value::String(error.to_string())
            }
        };

        Ok(TransportResponse { status, body })
    }

    async fn close(&self) {
        if self.client.write().take().is_some() {
            if let Some(total) = &self.total {
                total.close();
            }
            for entry in &self.per_host {
                entry.value().close();
            }
            tracing::debug!("HTTP pool closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.client.read().is_none()
    }
}

fn decode_body(body: &[u8]) -> Value {
    if body.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(body)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()))
}
