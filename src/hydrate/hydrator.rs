//! Record hydrator implementation

use crate::error::{Error, Result};
use crate::http::{Attempt, AttemptOutcome, Backpressure, Transport};
use crate::pagination::{FinalResult, PageRequest};
use crate::types::{Locator, Record};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Records between progress log lines
const PROGRESS_EVERY: usize = 50;

/// Requests in flight when nothing else is configured
pub const DEFAULT_CONCURRENCY: usize = 1;

/// A locator that could not be hydrated
#[derive(Debug)]
pub struct HydrationFailure {
    /// Locator as given
    pub locator: Locator,
    /// What went wrong
    pub error: Error,
}

/// Result of a hydration pass
#[derive(Debug, Default)]
pub struct HydrationOutcome {
    /// Hydrated records, in input order
    pub records: Vec<Record>,
    /// Locators that were skipped
    pub failures: Vec<HydrationFailure>,
    /// Request counter, carried in and advanced
    pub request_count: u64,
    /// Rate-limit waits observed
    pub rate_limited: u64,
    /// Whether cancellation cut the pass short
    pub cancelled: bool,
}

/// Fetches the full document for each locator
pub struct RecordHydrator {
    transport: Arc<dyn Transport>,
    backpressure: Backpressure,
    suffix: String,
    concurrency: usize,
    cancel: CancellationToken,
}

impl RecordHydrator {
    /// Create a sequential hydrator
    pub fn new(transport: Arc<dyn Transport>, backpressure: Backpressure) -> Self {
        Self {
            transport,
            backpressure,
            suffix: String::new(),
            concurrency: DEFAULT_CONCURRENCY,
            cancel: CancellationToken::new(),
        }
    }

    /// Append `suffix` to every locator before fetching
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Allow up to `concurrency` requests in flight
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Observe a cancellation signal between records and during waits
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Hydrate every locator, in order
    ///
    /// `request_count` is the number of requests already issued by the
    /// session; the returned outcome continues from it.
    pub async fn hydrate(&self, locators: &[Locator], request_count: u64) -> Result<HydrationOutcome> {
        if locators.is_empty() {
            return Err(Error::NoLocators);
        }

        info!(
            "Hydrating {} records ({} at a time)",
            locators.len(),
            self.concurrency
        );

        let mut outcome = HydrationOutcome {
            records: Vec::with_capacity(locators.len()),
            request_count,
            ..Default::default()
        };

        let mut attempts = stream::iter(locators)
            .map(|locator| self.fetch_one(locator))
            .buffered(self.concurrency);

        while let Some((locator, attempt)) = attempts.next().await {
            outcome.request_count += attempt.requests;
            outcome.rate_limited += attempt.waits;

            match attempt.outcome {
                AttemptOutcome::Completed(result) => match into_record(locator, result) {
                    Ok(record) => {
                        outcome.records.push(record);
                        if outcome.records.len() % PROGRESS_EVERY == 0 {
                            info!(
                                "Hydrated {} / {} records",
                                outcome.records.len(),
                                locators.len()
                            );
                        }
                    }
                    Err(e) => {
                        error!("Failed to hydrate {}: {}", locator, e);
                        outcome.failures.push(HydrationFailure {
                            locator: locator.clone(),
                            error: e,
                        });
                    }
                },
                AttemptOutcome::Failed(e) => {
                    error!("Request for {} failed: {}", locator, e);
                    outcome.failures.push(HydrationFailure {
                        locator: locator.clone(),
                        error: e,
                    });
                }
                AttemptOutcome::Cancelled => outcome.cancelled = true,
            }
        }

        if outcome.cancelled {
            warn!(
                "Hydration cancelled after {} of {} records",
                outcome.records.len(),
                locators.len()
            );
        } else {
            info!(
                "Hydrated {} records, {} failed",
                outcome.records.len(),
                outcome.failures.len()
            );
        }
        Ok(outcome)
    }

    async fn fetch_one<'a>(&self, locator: &'a Locator) -> (&'a Locator, Attempt) {
        let request = PageRequest::url(format!("{}{}", locator, self.suffix));
        let attempt = self
            .backpressure
            .fetch(self.transport.as_ref(), &request, &self.cancel)
            .await;
        (locator, attempt)
    }
}

impl std::fmt::Debug for RecordHydrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordHydrator")
            .field("suffix", &self.suffix)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

/// Turn a final classification into a record keyed by the input locator
fn into_record(locator: &Locator, result: FinalResult) -> Result<Record> {
    match result {
        FinalResult::Success(page) => page
            .records
            .into_iter()
            .next()
            .map(|record| Record::new(locator.clone(), record.body))
            .ok_or_else(|| Error::decode("empty response")),
        FinalResult::Malformed { reason, .. } => Err(Error::decode(reason)),
        FinalResult::Fatal { status, headers } => Err(Error::http_status(status, headers)),
    }
}
