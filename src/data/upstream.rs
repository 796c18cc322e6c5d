//! Upstream API client
//!
//! Thin wrapper over the market-data provider and the sentiment provider.
//! Makes exactly one attempt per call and classifies the outcome; retrying and
//! falling back are the fetcher's business.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use super::category::Endpoint;

/// Default base URL of the market-data provider
pub const DEFAULT_MARKET_BASE_URL: &str = "https://api.coingecko.com/api/v3";

/// Default URL of the sentiment provider
pub const DEFAULT_SENTIMENT_URL: &str = "https://api.alternative.me/fng/";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors that can occur when calling or decoding an upstream response
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// HTTP request failed (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Provider answered with a non-success status
    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    /// Failed to parse JSON response
    #[error("Failed to parse JSON response: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Missing expected field in response
    #[error("Missing expected field in response: {0}")]
    MissingField(String),
}

/// How an upstream call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Success,
    RateLimited,
    Error,
}

/// Result of one upstream call
#[derive(Debug)]
pub enum Outcome {
    /// 2xx with a JSON body
    Success(Value),
    /// HTTP 429; never retried inline
    RateLimited,
    /// Anything else: transport failure, timeout, non-2xx, non-JSON body
    Failed(UpstreamError),
}

/// Maps an HTTP status to its classification
pub fn classify_status(status: StatusCode) -> Classification {
    if status == StatusCode::TOO_MANY_REQUESTS {
        Classification::RateLimited
    } else if status.is_success() {
        Classification::Success
    } else {
        Classification::Error
    }
}

/// Source of raw upstream payloads
///
/// Implemented by [`UpstreamClient`]; tests substitute counting fakes.
#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn call(&self, endpoint: &Endpoint) -> Outcome;
}

/// Connection settings for both providers
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL that market endpoint paths are appended to
    pub market_base_url: String,
    /// Full URL of the sentiment endpoint
    pub sentiment_url: String,
    /// Bound on each request, connect included
    pub timeout: Duration,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            market_base_url: DEFAULT_MARKET_BASE_URL.to_string(),
            sentiment_url: DEFAULT_SENTIMENT_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// HTTP client for the market-data and sentiment providers
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: Client,
    config: UpstreamConfig,
}

impl UpstreamClient {
    /// Creates a client with the given settings
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("coinpulse/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    /// Creates a client around an existing reqwest client
    pub fn with_client(client: Client, config: UpstreamConfig) -> Self {
        let mut config = config;
        config.market_base_url = config.market_base_url.trim_end_matches('/').to_string();
        Self { client, config }
    }

    /// Full URL for an endpoint
    fn url(&self, endpoint: &Endpoint) -> String {
        match endpoint {
            Endpoint::Market(path) => format!("{}{}", self.config.market_base_url, path),
            Endpoint::Sentiment => self.config.sentiment_url.clone(),
        }
    }

    /// Sends the request and decodes the body, without classifying 429
    async fn send(&self, endpoint: &Endpoint) -> Result<(StatusCode, String), reqwest::Error> {
        let mut request = self
            .client
            .get(self.url(endpoint))
            .header(reqwest::header::ACCEPT, "application/json");
        if let Endpoint::Sentiment = endpoint {
            request = request.query(&[("limit", "1")]);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        Ok((status, body))
    }
}

#[async_trait]
impl MarketSource for UpstreamClient {
    async fn call(&self, endpoint: &Endpoint) -> Outcome {
        let url = self.url(endpoint);
        debug!(%url, "calling upstream");

        let (status, body) = match self.send(endpoint).await {
            Ok(response) => response,
            Err(e) => {
                warn!(%url, error = %e, timeout = e.is_timeout(), "upstream request failed");
                return Outcome::Failed(UpstreamError::RequestFailed(e));
            }
        };

        match classify_status(status) {
            Classification::RateLimited => {
                warn!(%url, "upstream rate limited");
                Outcome::RateLimited
            }
            Classification::Error => {
                warn!(%url, status = status.as_u16(), "upstream returned error status");
                Outcome::Failed(UpstreamError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            Classification::Success => match serde_json::from_str(&body) {
                Ok(value) => Outcome::Success(value),
                Err(e) => {
                    warn!(%url, error = %e, "upstream body is not JSON");
                    Outcome::Failed(UpstreamError::ParseError(e))
                }
            },
        }
    }
}
