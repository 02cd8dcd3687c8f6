//! Rate-limit aware HTTP transport
//!
//! Issues exactly one GET per call and classifies the response:
//! - 200 → decoded by the configured [`PageDecoder`] (`Success` or `Malformed`)
//! - backpressure status (429, and 503 where configured) → `RateLimited`
//! - anything else → `Fatal`
//!
//! The transport never sleeps or retries; that is the caller's job.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::AuthConfig;
use crate::decode::PageDecoder;
use crate::error::{Error, Result};
use crate::pagination::{PageRequest, PageResult};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Single-request page fetcher
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issue one request and classify its response
    async fn fetch(&self, request: &PageRequest) -> Result<PageResult>;
}

/// Configuration for the HTTP transport
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Statuses that signal backpressure
    pub backpressure_statuses: Vec<u16>,
    /// Proactive client-side quota
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: HashMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            backpressure_statuses: vec![429],
            rate_limit: None,
            default_headers: HashMap::new(),
            user_agent: format!("paged-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl TransportConfig {
    /// Create a new config builder
    pub fn builder() -> TransportConfigBuilder {
        TransportConfigBuilder::default()
    }
}

/// Builder for transport config
#[derive(Default)]
pub struct TransportConfigBuilder {
    config: TransportConfig,
}

impl TransportConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the statuses treated as backpressure
    pub fn backpressure_statuses(mut self, statuses: impl Into<Vec<u16>>) -> Self {
        self.config.backpressure_statuses = statuses.into();
        self
    }

    /// Set a proactive rate limit
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> TransportConfig {
        self.config
    }
}

/// reqwest-backed [`Transport`]
pub struct HttpTransport {
    client: Client,
    config: TransportConfig,
    auth: AuthConfig,
    decoder: Arc<dyn PageDecoder>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpTransport {
    /// Create a transport with its own client
    pub fn new(config: TransportConfig, decoder: Arc<dyn PageDecoder>) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;
        Ok(Self::with_client(client, config, decoder))
    }

    /// Create a transport sharing an existing client
    pub fn with_client(
        client: Client,
        config: TransportConfig,
        decoder: Arc<dyn PageDecoder>,
    ) -> Self {
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);
        Self {
            client,
            config,
            auth: AuthConfig::None,
            decoder,
            rate_limiter,
        }
    }

    /// Set authentication
    #[must_use]
    pub fn with_auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// Get the underlying reqwest client
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn is_backpressure(&self, status: StatusCode) -> bool {
        self.config.backpressure_statuses.contains(&status.as_u16())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, request: &PageRequest) -> Result<PageResult> {
        let url = request.to_url()?;

        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut req = self.client.get(url.as_str()).timeout(self.config.timeout);
        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        req = self.auth.apply(req);

        let response = req.send().await?;
        let status = response.status();
        debug!("GET {} -> {}", url, status.as_u16());

        if self.is_backpressure(status) {
            let retry_after_seconds = parse_retry_after(status, response.headers())?;
            return Ok(PageResult::RateLimited {
                retry_after_seconds,
            });
        }

        if status != StatusCode::OK {
            return Ok(PageResult::Fatal {
                status: status.as_u16(),
                headers: response.headers().clone(),
            });
        }

        let body = response.text().await?;
        Ok(self.decoder.decode(&body))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .field("decoder", &self.decoder)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Read `Retry-After` as floating point seconds
///
/// A backpressure status without the header is a server contract violation
/// and is reported, not guessed around.
pub fn parse_retry_after(status: StatusCode, headers: &HeaderMap) -> Result<f64> {
    let value = headers
        .get(RETRY_AFTER)
        .ok_or(Error::MissingRetryAfter {
            status: status.as_u16(),
        })?;
    let text = value.to_str().map_err(|_| Error::InvalidRetryAfter {
        value: String::from_utf8_lossy(value.as_bytes()).to_string(),
    })?;
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .ok_or_else(|| Error::InvalidRetryAfter {
            value: text.to_string(),
        })
}
