//! Configuration types for fetch sessions
//!
//! A session is described by a [`SessionConfig`], loadable from YAML or JSON
//! and overridable from the command line. Per-source defaults (endpoints,
//! query parameters, backpressure statuses) live on [`SourceKind`].

use crate::auth::AuthConfig;
use crate::error::{Error, Result};
use crate::http::{RateLimiterConfig, TransportConfig};
use crate::pagination::{LinkQuery, TokenQuery};
use crate::types::{DateRange, PaginationStyle};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

// ============================================================================
// Source Kind
// ============================================================================

/// Known source APIs
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// OSF Preprints (JSON:API, link pagination)
    #[default]
    Osf,
    /// arXiv OAI-PMH (XML, resumption tokens)
    Arxiv,
}

impl SourceKind {
    /// Short name, used in output file names
    pub fn name(&self) -> &'static str {
        match self {
            Self::Osf => "osf",
            Self::Arxiv => "arxiv",
        }
    }

    /// Pagination protocol spoken by this source
    pub fn style(&self) -> PaginationStyle {
        match self {
            Self::Osf => PaginationStyle::Link,
            Self::Arxiv => PaginationStyle::Token,
        }
    }

    /// Listing endpoint
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Osf => "https://api.osf.io/v2/preprints/",
            Self::Arxiv => "http://export.arxiv.org/oai2",
        }
    }

    /// Fixed query parameters of the first listing request
    pub fn base_params(&self) -> Vec<(String, String)> {
        match self {
            Self::Osf => vec![
                ("version".to_string(), "2.20".to_string()),
                ("fields[preprints]".to_string(), String::new()),
            ],
            Self::Arxiv => Vec::new(),
        }
    }

    /// Query parameters carrying the inclusive date bounds (link style)
    pub fn date_params(&self) -> (&'static str, &'static str) {
        match self {
            Self::Osf => ("filter[date_created][gte]", "filter[date_created][lte]"),
            Self::Arxiv => ("from", "until"),
        }
    }

    /// Suffix appended to a locator to fetch its full document
    pub fn detail_suffix(&self) -> Option<&'static str> {
        match self {
            Self::Osf => Some("?version=2.0&embed=contributors"),
            Self::Arxiv => None,
        }
    }

    /// Whether the source authenticates with a bearer token
    pub fn takes_bearer_token(&self) -> bool {
        matches!(self, Self::Osf)
    }

    /// Statuses answered with `Retry-After`
    pub fn backpressure_statuses(&self) -> Vec<u16> {
        match self {
            Self::Osf => vec![429],
            Self::Arxiv => vec![429, 503],
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Session Config
// ============================================================================

/// Complete description of one fetch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Source API
    #[serde(default)]
    pub source: SourceKind,

    /// Listing endpoint override
    #[serde(default)]
    pub base_url: Option<String>,

    /// Inclusive lower creation-date bound
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Inclusive upper creation-date bound
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Maximum records to return
    #[serde(default)]
    pub max_results: Option<usize>,

    /// Bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Fetch the full document for every listed record
    #[serde(default = "default_true")]
    pub hydrate: bool,

    /// Hydration requests in flight
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Margin added to every `Retry-After` delay
    #[serde(default = "default_retry_margin_ms")]
    pub retry_margin_ms: u64,

    /// Pause between token-style pages
    #[serde(default = "default_courtesy_delay_ms")]
    pub courtesy_delay_ms: u64,

    /// Request timeout
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Optional proactive client-side quota
    #[serde(default)]
    pub requests_per_second: Option<u32>,

    /// Optional hourly quota, the unit OSF publishes its limits in
    #[serde(default)]
    pub requests_per_hour: Option<u32>,

    /// OAI-PMH `metadataPrefix`
    #[serde(default = "default_metadata_prefix")]
    pub metadata_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

fn default_retry_margin_ms() -> u64 {
    500
}

fn default_courtesy_delay_ms() -> u64 {
    5000
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_metadata_prefix() -> String {
    "arXiv".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            source: SourceKind::default(),
            base_url: None,
            start_date: None,
            end_date: None,
            max_results: None,
            token: None,
            hydrate: default_true(),
            concurrency: default_concurrency(),
            retry_margin_ms: default_retry_margin_ms(),
            courtesy_delay_ms: default_courtesy_delay_ms(),
            timeout_secs: default_timeout_secs(),
            requests_per_second: None,
            requests_per_hour: None,
            metadata_prefix: default_metadata_prefix(),
        }
    }
}

impl SessionConfig {
    /// Create a new config builder
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }

    /// Load a config file
    ///
    /// `.json` files are parsed as JSON, anything else as YAML. The result is
    /// not validated; command line overrides may still supply bounds.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&content)?)
        } else {
            Self::from_yaml(&content)
        }
    }

    /// Parse a YAML document
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Reject configurations that cannot describe a bounded run
    pub fn validate(&self) -> Result<()> {
        if self.start_date.is_none() && self.end_date.is_none() && self.max_results.is_none() {
            return Err(Error::config(
                "At least one of start_date, end_date or max_results is required",
            ));
        }

        if !self.date_range().is_ordered() {
            return Err(Error::invalid_value(
                "end_date",
                "must not be earlier than start_date",
            ));
        }

        if self.max_results == Some(0) {
            return Err(Error::invalid_value("max_results", "must be positive"));
        }

        if self.concurrency == 0 {
            return Err(Error::invalid_value("concurrency", "must be at least 1"));
        }

        if self.requests_per_second == Some(0) {
            return Err(Error::invalid_value(
                "requests_per_second",
                "must be positive",
            ));
        }

        if self.requests_per_hour == Some(0) {
            return Err(Error::invalid_value("requests_per_hour", "must be positive"));
        }

        if self.requests_per_second.is_some() && self.requests_per_hour.is_some() {
            return Err(Error::config(
                "Set at most one of requests_per_second and requests_per_hour",
            ));
        }

        if self.source == SourceKind::Arxiv && self.metadata_prefix.trim().is_empty() {
            return Err(Error::invalid_value("metadata_prefix", "cannot be empty"));
        }

        url::Url::parse(self.base_url())
            .map_err(|e| Error::invalid_value("base_url", e.to_string()))?;

        if self.is_effectively_unbounded() {
            warn!(
                "{} has no server-side cap: the whole listing is walked before keeping {} records",
                self.source,
                self.max_results.unwrap_or_default()
            );
        }

        Ok(())
    }

    /// Whether only `max_results` bounds a source that cannot stop early
    ///
    /// Resumption-token listings are walked to exhaustion, so without a date
    /// bound the run covers the entire repository.
    pub fn is_effectively_unbounded(&self) -> bool {
        self.source.style() == PaginationStyle::Token
            && self.start_date.is_none()
            && self.end_date.is_none()
    }

    /// Listing endpoint in effect
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.source.default_base_url())
    }

    /// Configured creation-date bounds
    pub fn date_range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }

    /// Credentials in effect
    ///
    /// A token is only sent to sources that take one.
    pub fn auth(&self) -> AuthConfig {
        if !self.source.takes_bearer_token() {
            if self.token.as_deref().is_some_and(|t| !t.trim().is_empty()) {
                warn!("{} does not take a bearer token; sending requests anonymously", self.source);
            }
            return AuthConfig::None;
        }
        AuthConfig::from_token(self.token.as_deref())
    }

    /// Proactive quota in effect
    pub fn rate_limit(&self) -> Option<RateLimiterConfig> {
        self.requests_per_second
            .map(RateLimiterConfig::per_second)
            .or_else(|| self.requests_per_hour.map(RateLimiterConfig::per_hour))
    }

    /// Margin added to every `Retry-After` delay
    pub fn retry_margin(&self) -> Duration {
        Duration::from_millis(self.retry_margin_ms)
    }

    /// Pause between token-style pages
    pub fn courtesy_delay(&self) -> Duration {
        Duration::from_millis(self.courtesy_delay_ms)
    }

    /// First-request template for link-style sources
    pub fn link_query(&self) -> LinkQuery {
        let (start_param, end_param) = self.source.date_params();
        LinkQuery {
            base_url: self.base_url().to_string(),
            params: self.source.base_params(),
            start_param: start_param.to_string(),
            end_param: end_param.to_string(),
        }
    }

    /// First-request template for token-style sources
    pub fn token_query(&self) -> TokenQuery {
        TokenQuery {
            base_url: self.base_url().to_string(),
            metadata_prefix: self.metadata_prefix.clone(),
        }
    }

    /// Transport settings for this source
    pub fn transport_config(&self) -> TransportConfig {
        let mut builder = TransportConfig::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .backpressure_statuses(self.source.backpressure_statuses());
        if let Some(quota) = self.rate_limit() {
            builder = builder.rate_limit(quota);
        }
        builder.build()
    }
}

// ============================================================================
// Builder
// ============================================================================

/// Builder for [`SessionConfig`]
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Set the source API
    pub fn source(mut self, source: SourceKind) -> Self {
        self.config.source = source;
        self
    }

    /// Override the listing endpoint
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the inclusive lower date bound
    pub fn start_date(mut self, date: NaiveDate) -> Self {
        self.config.start_date = Some(date);
        self
    }

    /// Set the inclusive upper date bound
    pub fn end_date(mut self, date: NaiveDate) -> Self {
        self.config.end_date = Some(date);
        self
    }

    /// Cap the number of records
    pub fn max_results(mut self, max: usize) -> Self {
        self.config.max_results = Some(max);
        self
    }

    /// Set the bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Enable or disable hydration
    pub fn hydrate(mut self, hydrate: bool) -> Self {
        self.config.hydrate = hydrate;
        self
    }

    /// Set hydration concurrency
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the `Retry-After` margin
    pub fn retry_margin(mut self, margin: Duration) -> Self {
        self.config.retry_margin_ms = u64::try_from(margin.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the pause between token-style pages
    pub fn courtesy_delay(mut self, delay: Duration) -> Self {
        self.config.courtesy_delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs;
        self
    }

    /// Set a proactive quota
    pub fn requests_per_second(mut self, rps: u32) -> Self {
        self.config.requests_per_second = Some(rps);
        self
    }

    /// Set a proactive hourly quota
    pub fn requests_per_hour(mut self, rph: u32) -> Self {
        self.config.requests_per_hour = Some(rph);
        self
    }

    /// Set the OAI-PMH `metadataPrefix`
    pub fn metadata_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.metadata_prefix = prefix.into();
        self
    }

    /// Build the config
    pub fn build(self) -> SessionConfig {
        self.config
    }
}
