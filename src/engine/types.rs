//! Engine types
//!
//! Run statistics and the final outcome of a fetch session.

use crate::error::Error;
use crate::hydrate::HydrationOutcome;
use crate::pagination::WalkProgress;
use crate::types::Record;
use serde::Serialize;

/// Statistics from a fetch session
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// HTTP requests issued, retries included
    pub requests: u64,
    /// Listing pages processed
    pub pages: u64,
    /// Malformed listing pages skipped
    pub pages_skipped: u64,
    /// Records in the final result
    pub records: usize,
    /// Records lost to failed hydration
    pub records_dropped: usize,
    /// Records dropped because their locator was already seen
    pub duplicates: usize,
    /// Rate-limit waits, walk and hydration combined
    pub rate_limited_waits: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl RunStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold in the counters of a finished walk
    pub fn add_walk(&mut self, progress: &WalkProgress) {
        self.requests += progress.requests;
        self.pages += progress.pages;
        self.pages_skipped += progress.pages_skipped;
        self.rate_limited_waits += progress.rate_limited;
    }

    /// Fold in the counters of a hydration pass
    ///
    /// The hydrator carries the request counter forward, so it never moves
    /// backwards here.
    pub fn add_hydration(&mut self, outcome: &HydrationOutcome) {
        self.requests = self.requests.max(outcome.request_count);
        self.records_dropped += outcome.failures.len();
        self.rate_limited_waits += outcome.rate_limited;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} records, {} requests, {} pages ({} skipped), {} dropped, {} duplicates, {} rate-limit waits, {}ms",
            self.records,
            self.requests,
            self.pages,
            self.pages_skipped,
            self.records_dropped,
            self.duplicates,
            self.rate_limited_waits,
            self.duration_ms
        )
    }
}

/// How a fetch session ended
#[derive(Debug)]
pub enum SessionOutcome {
    /// The walk ran to exhaustion or to the cap
    ///
    /// Zero records here means the query was well formed and matched nothing.
    Completed {
        /// Final records
        records: Vec<Record>,
        /// Counters
        stats: RunStats,
    },
    /// The walk aborted after making progress; records are what was kept
    Partial {
        /// Records collected before the abort
        records: Vec<Record>,
        /// Counters
        stats: RunStats,
        /// What ended the walk
        error: Error,
    },
    /// The cancellation signal was observed
    Cancelled {
        /// Records collected before cancellation
        records: Vec<Record>,
        /// Counters
        stats: RunStats,
    },
    /// Nothing usable was produced
    Empty {
        /// Counters
        stats: RunStats,
        /// Why there is nothing
        error: Error,
    },
}

impl SessionOutcome {
    /// Records produced, if any
    pub fn records(&self) -> &[Record] {
        match self {
            Self::Completed { records, .. }
            | Self::Partial { records, .. }
            | Self::Cancelled { records, .. } => records,
            Self::Empty { .. } => &[],
        }
    }

    /// Take the records
    pub fn into_records(self) -> Vec<Record> {
        match self {
            Self::Completed { records, .. }
            | Self::Partial { records, .. }
            | Self::Cancelled { records, .. } => records,
            Self::Empty { .. } => Vec::new(),
        }
    }

    /// Run statistics
    pub fn stats(&self) -> &RunStats {
        match self {
            Self::Completed { stats, .. }
            | Self::Partial { stats, .. }
            | Self::Cancelled { stats, .. }
            | Self::Empty { stats, .. } => stats,
        }
    }

    /// The error that ended the session early, if any
    pub fn error(&self) -> Option<&Error> {
        match self {
            Self::Partial { error, .. } | Self::Empty { error, .. } => Some(error),
            Self::Completed { .. } | Self::Cancelled { .. } => None,
        }
    }

    /// Check if the session ran to completion
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Check if the session produced nothing usable
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Partial { .. } => "partial",
            Self::Cancelled { .. } => "cancelled",
            Self::Empty { .. } => "empty",
        }
    }
}
