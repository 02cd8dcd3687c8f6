//! Link-following pagination
//!
//! Walks JSON:API style listings by following `links.next` until the server
//! stops declaring one or the record cap is reached.

use super::types::{div_ceil, FinalResult, PageRequest, Step, StopReason, WalkOutcome, WalkProgress};
use crate::error::{Error, Result};
use crate::http::{AttemptOutcome, Backpressure, Transport};
use crate::types::{DateRange, Record};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Pages between progress log lines
const PROGRESS_EVERY: u64 = 10;

/// How to build the first request of a link-style walk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkQuery {
    /// Listing endpoint
    pub base_url: String,
    /// Fixed query parameters
    pub params: Vec<(String, String)>,
    /// Parameter for the inclusive lower date bound
    pub start_param: String,
    /// Parameter for the inclusive upper date bound
    pub end_param: String,
}

impl LinkQuery {
    /// Render the first request for the given date range
    pub fn first_request(&self, range: &DateRange) -> Result<PageRequest> {
        let mut params = self.params.clone();
        if let Some(start) = range.start_str() {
            params.push((self.start_param.clone(), start));
        }
        if let Some(end) = range.end_str() {
            params.push((self.end_param.clone(), end));
        }
        let url = url::Url::parse_with_params(&self.base_url, &params)?;
        Ok(PageRequest::Url(url.into()))
    }
}

/// Sequential walker over a link-paginated listing
pub struct LinkPageWalker {
    transport: Arc<dyn Transport>,
    backpressure: Backpressure,
    cancel: CancellationToken,
    max_results: Option<usize>,
    pending: Option<PageRequest>,
    started: bool,
    collected: usize,
    progress: WalkProgress,
    stop: Option<StopReason>,
}

impl LinkPageWalker {
    /// Create a walker starting at `first`
    pub fn new(transport: Arc<dyn Transport>, backpressure: Backpressure, first: PageRequest) -> Self {
        Self {
            transport,
            backpressure,
            cancel: CancellationToken::new(),
            max_results: None,
            pending: Some(first),
            started: false,
            collected: 0,
            progress: WalkProgress::default(),
            stop: None,
        }
    }

    /// Cap the number of records returned
    #[must_use]
    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
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

        let attempt = self
            .backpressure
            .fetch(self.transport.as_ref(), &request, &self.cancel)
            .await;
        self.progress.requests += attempt.requests;
        self.progress.rate_limited += attempt.waits;

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
                if first {
                    self.plan(page.declared_total, page.per_page);
                }
                self.progress.pages += 1;
                self.collected += page.records.len();

                if self.progress.pages % PROGRESS_EVERY == 0 {
                    info!("Page {}: {} records", self.progress.pages, self.collected);
                }

                if self.max_results.is_some_and(|max| self.collected >= max) {
                    self.stop = Some(StopReason::CapReached);
                } else if let Some(next) = page.next {
                    self.pending = Some(next);
                } else {
                    self.stop = Some(StopReason::Exhausted);
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
                        error!("Malformed page {} has no continuation: {}", request, reason);
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

    /// Drive the walk to completion
    pub async fn run(mut self) -> WalkOutcome {
        let mut records: Vec<Record> = Vec::new();
        while let Some(step) = self.next_page().await {
            if let Step::Records(page) = step {
                records.extend(page);
            }
        }
        if let Some(max) = self.max_results {
            records.truncate(max);
        }

        WalkOutcome {
            records,
            stop: self.stop.take().unwrap_or(StopReason::Exhausted),
            progress: self.progress,
        }
    }

    /// Advisory page count from the first page's counters
    fn plan(&mut self, total: Option<u64>, per_page: Option<u64>) {
        let (Some(total), Some(per_page)) = (total, per_page) else {
            return;
        };
        let pages = match self.max_results {
            Some(max) => div_ceil(total, per_page).min(div_ceil(max as u64, per_page)),
            None => div_ceil(total, per_page),
        };
        self.progress.expected_pages = Some(pages);
        self.progress.declared_total = Some(total);
        info!("Total pages: {}", pages);
        info!("Total records: {}", total);
    }

    fn finish(&mut self, reason: StopReason) -> Option<Step> {
        self.stop = Some(reason);
        None
    }
}

impl std::fmt::Debug for LinkPageWalker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkPageWalker")
            .field("max_results", &self.max_results)
            .field("pending", &self.pending)
            .field("progress", &self.progress)
            .finish_non_exhaustive()
    }
}
