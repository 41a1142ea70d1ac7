//! Client-side interface to the remote analysis service.
//!
//! The scan engine talks to the service through [`AnalyzeTransport`] so the
//! state machine can be driven by a scripted transport in tests.

mod query;
mod report;

pub use query::*;
pub use report::*;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Transport-level request timeout. The service can take a while to answer
/// under load, so this is deliberately generous.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(100);

/// Transport error types.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
}

/// One HTTP exchange, reduced to what classification needs.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues one GET against the analysis endpoint.
#[async_trait]
pub trait AnalyzeTransport: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ApiResponse, TransportError>;
}

/// Production transport over a shared reqwest client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AnalyzeTransport for HttpTransport {
    async fn fetch(&self, url: &str) -> Result<ApiResponse, TransportError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Network(e.to_string())
            }
        })?;

        Ok(ApiResponse { status, body })
    }
}
