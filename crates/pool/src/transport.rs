//! Outbound transport seam.
//!
//! The pool talks to providers through [`SearchTransport`] so tests can
//! script upstream behavior; [`HttpTransport`] is the production
//! implementation over a pooled reqwest client.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::provider::{harvest_usage_headers, UsageHeaders};

/// One fully-built provider request.
#[derive(Debug, Clone)]
pub struct ProviderRequest {
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    /// Independent abort deadline for this request.
    pub timeout: Duration,
}

/// Raw provider reply before parsing. `body` is `Value::Null` when the
/// payload was not valid JSON; the executor classifies that as a parse
/// failure.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub status: u16,
    pub body: Value,
    pub usage: UsageHeaders,
}

impl ProviderResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Human-readable error text for a failed reply, from the common
    /// provider body shapes.
    pub fn error_message(&self) -> String {
        self.body
            .get("error")
            .map(|e| {
                e.get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| e.to_string())
            })
            .or_else(|| {
                self.body
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }
}

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request deadline exceeded")]
    Timeout,

    #[error("transport failure: {0}")]
    Network(String),
}

#[async_trait]
pub trait SearchTransport: Send + Sync {
    async fn execute(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError>;
}

/// Production transport over reqwest with connection pooling.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl SearchTransport for HttpTransport {
    async fn execute(&self, request: ProviderRequest) -> Result<ProviderResponse, TransportError> {
        let response = self
            .client
            .get(&request.endpoint)
            .query(&request.params)
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout
                } else {
                    TransportError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let usage = harvest_usage_headers(
            response
                .headers()
                .iter()
                .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v))),
        );
        let body = response
            .json::<Value>()
            .await
            .unwrap_or(Value::Null);

        Ok(ProviderResponse {
            status,
            body,
            usage,
        })
    }
}
