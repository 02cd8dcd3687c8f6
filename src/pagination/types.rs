//! Pagination types
//!
//! Defines the request/result vocabulary shared by the transport and the
//! page walkers.

use crate::error::{Error, Result};
use crate::types::Record;
use reqwest::header::HeaderMap;
use url::Url;

/// Descriptor of the next page to fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// Fully formed URL (link pagination, or the first token-style request)
    Url(String),
    /// Resumption token continuation against a base endpoint
    Token {
        /// Endpoint without query
        base_url: String,
        /// Opaque resumption token
        token: String,
    },
}

impl PageRequest {
    /// Create a URL request
    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    /// Create a resumption token request
    pub fn token(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self::Token {
            base_url: base_url.into(),
            token: token.into(),
        }
    }

    /// Render the request as a URL
    ///
    /// Token continuations carry only `verb` and `resumptionToken`; the
    /// server rejects any other parameter alongside a token.
    pub fn to_url(&self) -> Result<Url> {
        match self {
            Self::Url(url) => Ok(Url::parse(url)?),
            Self::Token { base_url, token } => Ok(Url::parse_with_params(
                base_url,
                &[("verb", "ListRecords"), ("resumptionToken", token.as_str())],
            )?),
        }
    }
}

impl std::fmt::Display for PageRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::Token { base_url, token } => write!(f, "{base_url} [token {token}]"),
        }
    }
}

/// One successfully decoded page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    /// Records on this page, in server order
    pub records: Vec<Record>,
    /// Continuation, if the server declared one
    pub next: Option<PageRequest>,
    /// Declared size of the complete result set
    pub declared_total: Option<u64>,
    /// Declared page size
    pub per_page: Option<u64>,
    /// Server-side position of this page within the result set
    pub cursor: Option<u64>,
}

impl Page {
    /// Create a page of records
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    /// Set the continuation
    #[must_use]
    pub fn with_next(mut self, next: PageRequest) -> Self {
        self.next = Some(next);
        self
    }

    /// Set the declared totals
    #[must_use]
    pub fn with_totals(mut self, total: u64, per_page: u64) -> Self {
        self.declared_total = Some(total);
        self.per_page = Some(per_page);
        self
    }
}

/// Classified outcome of fetching one page
#[derive(Debug, Clone)]
pub enum PageResult {
    /// 200 with the expected structure
    Success(Page),
    /// Server asked us to wait before retrying
    RateLimited {
        /// Delay from `Retry-After`
        retry_after_seconds: f64,
    },
    /// 200 but without the expected structure
    Malformed {
        /// What was missing
        reason: String,
        /// Continuation salvaged from the body, if any
        next: Option<PageRequest>,
    },
    /// Any other non-200 response
    Fatal {
        /// HTTP status
        status: u16,
        /// Response headers
        headers: HeaderMap,
    },
}

impl PageResult {
    /// Create a malformed result without a continuation
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
            next: None,
        }
    }

    /// Check if this is a success
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Check if this is a rate limit signal
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// A page classification that no amount of waiting will change
///
/// What the retry loop hands back once every rate limit has been waited out.
#[derive(Debug, Clone)]
pub enum FinalResult {
    /// 200 with the expected structure
    Success(Page),
    /// 200 but without the expected structure
    Malformed {
        /// What was missing
        reason: String,
        /// Continuation salvaged from the body, if any
        next: Option<PageRequest>,
    },
    /// Any other non-200 response
    Fatal {
        /// HTTP status
        status: u16,
        /// Response headers
        headers: HeaderMap,
    },
}

/// Why a walk ended
#[derive(Debug)]
pub enum StopReason {
    /// The server declared no further page
    Exhausted,
    /// The configured record cap was reached
    CapReached,
    /// A fatal outcome ended the walk
    Aborted(Error),
    /// The cancellation signal was observed
    Cancelled,
}

impl StopReason {
    /// Check if the walk ended without error
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Exhausted | Self::CapReached)
    }
}

/// Result of advancing a walker by one page
#[derive(Debug)]
pub enum Step {
    /// A page of records
    Records(Vec<Record>),
    /// A malformed page was skipped
    Skipped,
}

/// Counters a walker reports back to its session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkProgress {
    /// HTTP requests issued, retries included
    pub requests: u64,
    /// Pages successfully processed
    pub pages: u64,
    /// Malformed pages skipped
    pub pages_skipped: u64,
    /// Rate-limit waits observed
    pub rate_limited: u64,
    /// Advisory page count computed from the first page
    pub expected_pages: Option<u64>,
    /// Advisory record count declared by the server
    pub declared_total: Option<u64>,
}

/// Final result of a walk
#[derive(Debug)]
pub struct WalkOutcome {
    /// Records accumulated, in server order
    pub records: Vec<Record>,
    /// Why the walk ended
    pub stop: StopReason,
    /// Counters
    pub progress: WalkProgress,
}

impl WalkOutcome {
    /// Check if the walk ended without error
    pub fn is_complete(&self) -> bool {
        self.stop.is_clean()
    }
}

/// Ceiling division for page arithmetic
pub(crate) fn div_ceil(total: u64, per_page: u64) -> u64 {
    if per_page == 0 {
        return 0;
    }
    total / per_page + u64::from(total % per_page > 0)
}
