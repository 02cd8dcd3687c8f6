//! Execution engine module
//!
//! Drives one bulk-retrieval run from configuration to result.
//!
//! # Overview
//!
//! The engine module provides:
//! - `FetchSession` - Validates config, runs the walker, dedupes, hydrates
//! - `RunStats` - Counters folded from every stage
//! - `SessionOutcome` - Completed, partial, cancelled or empty result

mod types;

pub use types::{RunStats, SessionOutcome};

use crate::config::SessionConfig;
use crate::decode::{JsonApiDetailDecoder, JsonApiListDecoder, OaiPmhDecoder, PageDecoder};
use crate::error::{Error, Result};
use crate::http::{Backpressure, HttpTransport, Sleeper, TokioSleeper, Transport};
use crate::hydrate::RecordHydrator;
use crate::pagination::{LinkPageWalker, StopReason, TokenPageWalker, WalkOutcome};
use crate::types::{Locator, PaginationStyle, Record};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Listing and detail transports of one session
#[derive(Clone)]
struct Transports {
    listing: Arc<dyn Transport>,
    detail: Arc<dyn Transport>,
}

/// One bulk-retrieval run
pub struct FetchSession {
    /// Session configuration
    config: SessionConfig,
    /// Source of all waits
    sleeper: Arc<dyn Sleeper>,
    /// Cancellation signal
    cancel: CancellationToken,
    /// Injected transports, built from config when absent
    transports: Option<Transports>,
}

impl FetchSession {
    /// Create a new session
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
            transports: None,
        }
    }

    /// Use a different sleeper for rate-limit waits and courtesy pauses
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Observe a cancellation signal
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Use the given transports instead of building HTTP ones
    #[must_use]
    pub fn with_transports(mut self, listing: Arc<dyn Transport>, detail: Arc<dyn Transport>) -> Self {
        self.transports = Some(Transports { listing, detail });
        self
    }

    /// Get the configuration
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Run the session
    ///
    /// Configuration problems are returned as `Err` before any request is
    /// made. Everything that happens once the walk has started is reported
    /// through the returned [`SessionOutcome`].
    pub async fn run(&self) -> Result<SessionOutcome> {
        self.config.validate()?;
        let transports = match &self.transports {
            Some(transports) => transports.clone(),
            None => self.build_transports()?,
        };

        let start = Instant::now();
        let backpressure = Backpressure::new(self.sleeper.clone(), self.config.retry_margin());
        let mut stats = RunStats::new();

        info!(
            "Fetching from {} ({})",
            self.config.base_url(),
            self.config.source
        );
        let walk = self.walk(transports.listing, backpressure.clone()).await?;
        stats.add_walk(&walk.progress);

        let (mut records, duplicates) = dedupe(walk.records);
        stats.duplicates = duplicates;
        if duplicates > 0 {
            warn!("Dropped {} duplicate records", duplicates);
        }

        let mut cancelled = matches!(walk.stop, StopReason::Cancelled);
        let abort = match walk.stop {
            StopReason::Aborted(e) => Some(e),
            _ => None,
        };

        if records.is_empty() {
            if let Some(error) = abort {
                return Ok(self.finish_empty(stats, start, error));
            }
        }

        let suffix = self.config.source.detail_suffix();
        if let Some(suffix) = suffix.filter(|_| self.config.hydrate && !cancelled) {
            if records.is_empty() {
                return Ok(self.finish_empty(stats, start, Error::NoLocators));
            }

            let locators: Vec<Locator> = records.iter().map(|r| r.locator.clone()).collect();
            let hydrated = RecordHydrator::new(transports.detail, backpressure)
                .with_suffix(suffix)
                .with_concurrency(self.config.concurrency)
                .with_cancellation(self.cancel.clone())
                .hydrate(&locators, stats.requests)
                .await?;
            stats.add_hydration(&hydrated);
            cancelled |= hydrated.cancelled;
            records = hydrated.records;
        }

        stats.records = records.len();
        stats.set_duration(elapsed_ms(start));

        let outcome = if cancelled {
            SessionOutcome::Cancelled { records, stats }
        } else if let Some(error) = abort {
            SessionOutcome::Partial {
                records,
                stats,
                error,
            }
        } else {
            SessionOutcome::Completed { records, stats }
        };
        info!("Session {}: {}", outcome.label(), outcome.stats());
        Ok(outcome)
    }

    async fn walk(&self, listing: Arc<dyn Transport>, backpressure: Backpressure) -> Result<WalkOutcome> {
        let range = self.config.date_range();
        match self.config.source.style() {
            PaginationStyle::Link => {
                let first = self.config.link_query().first_request(&range)?;
                Ok(LinkPageWalker::new(listing, backpressure, first)
                    .with_max_results(self.config.max_results)
                    .with_cancellation(self.cancel.clone())
                    .run()
                    .await)
            }
            PaginationStyle::Token => {
                let first = self.config.token_query().first_request(&range)?;
                let mut outcome = TokenPageWalker::new(listing, backpressure, first)
                    .with_courtesy_delay(self.config.courtesy_delay())
                    .with_cancellation(self.cancel.clone())
                    .run()
                    .await;
                // The token protocol has no page size control; cap afterwards
                if let Some(max) = self.config.max_results {
                    outcome.records.truncate(max);
                }
                Ok(outcome)
            }
        }
    }

    fn build_transports(&self) -> Result<Transports> {
        let listing_decoder: Arc<dyn PageDecoder> = match self.config.source.style() {
            PaginationStyle::Link => Arc::new(JsonApiListDecoder::new()),
            PaginationStyle::Token => Arc::new(OaiPmhDecoder::new(self.config.base_url())),
        };

        let auth = self.config.auth();
        let listing = HttpTransport::new(self.config.transport_config(), listing_decoder)?
            .with_auth(auth.clone());
        let detail = HttpTransport::with_client(
            listing.inner().clone(),
            self.config.transport_config(),
            Arc::new(JsonApiDetailDecoder::new()),
        )
        .with_auth(auth);

        Ok(Transports {
            listing: Arc::new(listing),
            detail: Arc::new(detail),
        })
    }

    fn finish_empty(&self, mut stats: RunStats, start: Instant, error: Error) -> SessionOutcome {
        stats.set_duration(elapsed_ms(start));
        warn!("Session ended without results: {}", error);
        SessionOutcome::Empty { stats, error }
    }
}

impl std::fmt::Debug for FetchSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchSession")
            .field("source", &self.config.source)
            .field("base_url", &self.config.base_url())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Drop records whose locator was already seen, keeping the first
fn dedupe(records: Vec<Record>) -> (Vec<Record>, usize) {
    let before = records.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<Record> = records
        .into_iter()
        .filter(|record| seen.insert(record.locator.clone()))
        .collect();
    let duplicates = before - unique.len();
    (unique, duplicates)
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
