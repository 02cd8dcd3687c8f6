//! Proactive client-side rate limiting
//!
//! Server backpressure is handled reactively by the retry loop. This limiter
//! is the optional complement: it spaces requests out up front so a long run
//! stays under a known quota instead of bouncing off it.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Largest burst allowed, so an hourly quota is not spent at once
const MAX_BURST: u32 = 10;

/// Quota of `requests` per `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests allowed per window
    pub requests: u32,
    /// Length of the window
    pub window: Duration,
}

impl RateLimiterConfig {
    /// `requests` per second
    pub fn per_second(requests: u32) -> Self {
        Self {
            requests,
            window: Duration::from_secs(1),
        }
    }

    /// `requests` per hour
    pub fn per_hour(requests: u32) -> Self {
        Self {
            requests,
            window: Duration::from_secs(3600),
        }
    }

    /// Minimum spacing between two requests
    pub fn interval(&self) -> Duration {
        self.window / self.requests.max(1)
    }

    fn quota(&self) -> Quota {
        let interval = self.interval().max(Duration::from_nanos(1));
        let burst = NonZeroU32::new(self.requests.clamp(1, MAX_BURST)).unwrap_or(NonZeroU32::MIN);
        Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
            .allow_burst(burst)
    }
}

/// Token bucket rate limiter shared by clones
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        Self {
            limiter: Arc::new(Governor::direct(config.quota())),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }

    /// Try to acquire a permit, returning immediately
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}
