//! Backpressure handling
//!
//! The transport never waits; callers drive retries through [`Backpressure`],
//! which sleeps out the server's `Retry-After` plus a fixed margin and
//! retries the identical request. Retries are unbounded: the server's own
//! signal is the only backoff.

use super::transport::Transport;
use crate::error::Error;
use crate::pagination::{FinalResult, PageRequest, PageResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Safety margin added to every server-provided delay
pub const DEFAULT_RETRY_MARGIN: Duration = Duration::from_millis(500);

// ============================================================================
// Sleeper
// ============================================================================

/// Source of delays, injectable so tests never touch the wall clock
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for the given duration
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that returns immediately and remembers what it was asked
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create a new recording sleeper
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps
            .lock()
            .map(|sleeps| sleeps.clone())
            .unwrap_or_default()
    }

    /// Sum of all requested durations
    pub fn total(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Retry loop
// ============================================================================

/// How a fetch attempt ended
#[derive(Debug)]
pub enum AttemptOutcome {
    /// A final classification
    Completed(FinalResult),
    /// The transport itself failed
    Failed(Error),
    /// Cancellation was observed before a final classification
    Cancelled,
}

/// One logical fetch, including any rate-limit retries
#[derive(Debug)]
pub struct Attempt {
    /// HTTP requests issued
    pub requests: u64,
    /// Rate-limit waits performed
    pub waits: u64,
    /// Final outcome
    pub outcome: AttemptOutcome,
}

/// Shared backpressure state for every caller of one session
///
/// Cloning is cheap and clones share the pause gate: a rate limit seen by
/// any caller pushes out a shared deadline, and every caller waits until
/// that deadline before its next request. Simultaneous rate limits overlap
/// instead of queueing behind each other.
#[derive(Clone)]
pub struct Backpressure {
    sleeper: Arc<dyn Sleeper>,
    paused_until: Arc<RwLock<Option<Instant>>>,
    margin: Duration,
}

impl Backpressure {
    /// Create with the given sleeper and safety margin
    pub fn new(sleeper: Arc<dyn Sleeper>, margin: Duration) -> Self {
        Self {
            sleeper,
            paused_until: Arc::new(RwLock::new(None)),
            margin,
        }
    }

    /// The configured safety margin
    pub fn margin(&self) -> Duration {
        self.margin
    }

    /// Sleep for a fixed delay, unless cancelled first
    ///
    /// Returns `false` when cancellation won.
    pub async fn pause(&self, duration: Duration, cancel: &CancellationToken) -> bool {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            () = self.sleeper.sleep(duration) => true,
        }
    }

    /// Fetch `request`, retrying the same request for as long as the server
    /// answers with a backpressure signal
    pub async fn fetch(
        &self,
        transport: &dyn Transport,
        request: &PageRequest,
        cancel: &CancellationToken,
    ) -> Attempt {
        let mut attempt = Attempt {
            requests: 0,
            waits: 0,
            outcome: AttemptOutcome::Cancelled,
        };
        // Latest shared deadline this caller has already waited out
        let mut cleared: Option<Instant> = None;

        loop {
            if cancel.is_cancelled() {
                return attempt;
            }

            let paused = *self.paused_until.read().await;
            if let Some(until) = paused.filter(|until| cleared.map_or(true, |c| *until > c)) {
                cleared = Some(until);
                let remaining = until.saturating_duration_since(Instant::now());
                if !remaining.is_zero() && !self.pause(remaining, cancel).await {
                    return attempt;
                }
            }

            attempt.requests += 1;
            let result = match transport.fetch(request).await {
                Ok(result) => result,
                Err(e) => {
                    attempt.outcome = AttemptOutcome::Failed(e);
                    return attempt;
                }
            };

            let final_result = match result {
                PageResult::Success(page) => FinalResult::Success(page),
                PageResult::Malformed { reason, next } => FinalResult::Malformed { reason, next },
                PageResult::Fatal { status, headers } => FinalResult::Fatal { status, headers },
                PageResult::RateLimited {
                    retry_after_seconds,
                } => {
                    let delay = retry_delay(retry_after_seconds) + self.margin;
                    warn!(
                        "Rate limited on {}, retrying in {:.1}s (request {})",
                        request,
                        delay.as_secs_f64(),
                        attempt.requests
                    );
                    attempt.waits += 1;

                    let now = Instant::now();
                    let until = self.extend_pause(now + delay).await;
                    cleared = Some(until);
                    if !self.pause(until.saturating_duration_since(now), cancel).await {
                        return attempt;
                    }
                    self.release_pause(until).await;
                    continue;
                }
            };

            attempt.outcome = AttemptOutcome::Completed(final_result);
            return attempt;
        }
    }

    /// Push the shared deadline out to at least `deadline`
    async fn extend_pause(&self, deadline: Instant) -> Instant {
        let mut paused = self.paused_until.write().await;
        let until = paused.map_or(deadline, |current| current.max(deadline));
        *paused = Some(until);
        until
    }

    /// Clear the shared deadline once it has been waited out, unless
    /// another caller has pushed it further
    async fn release_pause(&self, until: Instant) {
        let mut paused = self.paused_until.write().await;
        if *paused == Some(until) {
            *paused = None;
        }
    }
}

impl std::fmt::Debug for Backpressure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backpressure")
            .field("margin", &self.margin)
            .finish_non_exhaustive()
    }
}

/// Convert a server delay to a duration, clamping nonsense to zero
fn retry_delay(seconds: f64) -> Duration {
    if seconds.is_finite() && seconds > 0.0 {
        Duration::from_secs_f64(seconds)
    } else {
        Duration::ZERO
    }
}
