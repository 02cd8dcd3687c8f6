//! HTTP module
//!
//! Provides the single-request transport and the retry discipline around it.
//!
//! # Features
//!
//! - **Classification**: every response becomes a `PageResult`
//! - **Backpressure**: `Retry-After` waits with a safety margin, shared by all workers
//! - **Rate Limiting**: optional token bucket quota using governor
//! - **Authentication**: optional bearer token

mod backoff;
mod rate_limit;
mod transport;

pub use backoff::{
    Attempt, AttemptOutcome, Backpressure, RecordingSleeper, Sleeper, TokioSleeper,
    DEFAULT_RETRY_MARGIN,
};
pub use rate_limit::{RateLimiter, RateLimiterConfig};
pub use transport::{
    parse_retry_after, HttpTransport, Transport, TransportConfig, TransportConfigBuilder,
};
