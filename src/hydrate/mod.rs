//! Per-record hydration
//!
//! A listing walk yields one locator per record. Hydration fetches the full
//! document behind each locator, under the same backpressure discipline as
//! the walk. Failures are recorded and skipped; the pass never aborts.

mod hydrator;

pub use hydrator::{HydrationFailure, HydrationOutcome, RecordHydrator, DEFAULT_CONCURRENCY};

#[cfg(test)]
mod tests;
