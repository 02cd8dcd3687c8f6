//! Resumption-token pagination
//!
//! Walks OAI-PMH `ListRecords` responses. Each response may carry a
//! resumption token; the walk continues while one is present and always
//! runs to exhaustion.

use super::types::{FinalResult, PageRequest, Step, StopReason, WalkOutcome, WalkProgress};
use crate::error::{Error, Result};
use crate::http::{AttemptOutcome, Backpressure, Transport};
use crate::types::{DateRange, Record};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Pause between successful pages, to go easy on the source
pub const DEFAULT_COURTESY_DELAY: Duration = Duration::from_secs(5);

/// How to build the first request of a token-style walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenQuery {
    /// OAI-PMH endpoint
    pub base_url: String,
    /// `metadataPrefix` to request
    pub metadata_prefix: String,
}

impl TokenQuery {
    /// Render the first request for the given date range
    pub fn first_request(&self, range: &DateRange) -> Result<PageRequest> {
        let mut params = vec![
            ("verb".to_string(), "ListRecords".to_string()),
            ("metadataPrefix".to_string(), self.metadata_prefix.clone()),
        ];
        if let Some(from) = range.start_str() {
            params.push(("from".to_string(), from));
        }
        if let Some(until) = range.end_str() {
            params.push(("until".to_string(), until));
        }
        let url = url::Url::parse_with_params(&self.base_url, &params)?;
        Ok(PageRequest::Url(url.into()))
    }
}

/// Sequential walker over a resumption-token listing
pub struct TokenPageWalker {
    transport: Arc<dyn Transport>,
    backpressure: Backpressure,
    cancel: CancellationToken,
    courtesy_delay: Duration,
    pending: Option<PageRequest>,
    started: bool,
    after_success: bool,
    progress: WalkProgress,
    stop: Option<StopReason>,
}

impl TokenPageWalker {
    /// Create a walker starting at `first`
    pub fn new(transport: Arc<dyn Transport>, backpressure: Backpressure, first: PageRequest) -> Self {
        Self {
            transport,
            backpressure,
            cancel: CancellationToken::new(),
            courtesy_delay: DEFAULT_COURTESY_DELAY,
            pending: Some(first),
            started: false,
            after_success: false,
            progress: WalkProgress::default(),
            stop: None,
        }
    }

    /// Set the pause between successful pages
    #[must_use]
    pub fn with_courtesy_delay(mut self, delay: Duration) -> Self {
        self.courtesy_delay = delay;
        self
    }

    /// Observe a cancellation signal between pages and during waits
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Counters so far
    pub fn progress(&self) -> WalkProgress {
        self.progress
    }

    /// Why the walk ended, once it has
    pub fn stop_reason(&self) -> Option<&StopReason> {
        self.stop.as_ref()
    }

    /// Fetch the next page
    ///
    /// Returns `None` once the walk has ended; see [`Self::stop_reason`].
    pub async fn next_page(&mut self) -> Option<Step> {
        if self.stop.is_some() {
            return None;
        }
        let Some(request) = self.pending.take() else {
            return self.finish(StopReason::Exhausted);
        };
        let first = !self.started;
        self.started = true;

        if self.after_success
            && !self.courtesy_delay.is_zero()
            && !self.backpressure.pause(self.courtesy_delay, &self.cancel).await
        {
            return self.finish(StopReason::Cancelled);
        }

        let attempt = self
            .backpressure
            .fetch(self.transport.as_ref(), &request, &self.cancel)
            .await;
        self.progress.requests += attempt.requests;
        self.progress.rate_limited += attempt.waits;

        self.after_success = false;

        let result = match attempt.outcome {
            AttemptOutcome::Completed(result) => result,
            AttemptOutcome::Failed(e) => {
                error!("Request for {} failed: {}", request, e);
                return self.finish(StopReason::Aborted(e));
            }
            AttemptOutcome::Cancelled => {
                info!("Walk cancelled after {} pages", self.progress.pages);
                return self.finish(StopReason::Cancelled);
            }
        };

        match result {
            FinalResult::Success(page) => {
                self.after_success = true;
                self.progress.pages += 1;
                if first {
                    self.progress.declared_total = page.declared_total;
                }
                match (page.cursor, self.progress.declared_total) {
                    (Some(cursor), Some(total)) => info!("{} / {}", cursor, total),
                    _ => info!("Page {}: {} records", self.progress.pages, page.records.len()),
                }

                match page.next {
                    Some(next) => self.pending = Some(next),
                    None => self.stop = Some(StopReason::Exhausted),
                }
                Some(Step::Records(page.records))
            }
            FinalResult::Malformed { reason, .. } if first => {
                error!("First page {} was malformed: {}", request, reason);
                self.finish(StopReason::Aborted(Error::MalformedInitialPage { reason }))
            }
            FinalResult::Malformed { reason, next } => {
                self.progress.pages_skipped += 1;
                match next {
                    Some(next) => {
                        warn!("Skipping malformed page {}: {}", request, reason);
                        self.pending = Some(next);
                        Some(Step::Skipped)
                    }
                    None => {
                        error!("Malformed page {} has no resumption token: {}", request, reason);
                        self.finish(StopReason::Aborted(Error::decode(reason)))
                    }
                }
            }
            FinalResult::Fatal { status, headers } => {
                error!("Request for {} failed with HTTP {}: {:?}", request, status, headers);
                self.finish(StopReason::Aborted(Error::http_status(status, headers)))
            }
        }
    }

    /// Drive the walk to exhaustion
    pub async fn run(mut self) -> WalkOutcome {
        let mut records: Vec<Record> = Vec::new();
        while let Some(step) = self.next_page().await {
            if let Step::Records(page) = step {
                records.extend(page);
            }
        }

        WalkOutcome {
            records,
            stop: self.stop.take().unwrap_or(StopReason::Exhausted),
            progress: self.progress,
        }
    }

    fn finish(&mut self, reason: StopReason) -> Option<Step> {
        self.stop = Some(reason);
        None
    }
}

impl std::fmt::Debug for TokenPageWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPageWalker")
            .field("courtesy_delay", &self.courtesy_delay)
            .field("pending", &self.pending)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}
