// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # paged-harvest
//!
//! Reliable, resumable bulk retrieval from paginated, rate-limited web APIs.
//!
//! ## Features
//!
//! - **Link Pagination**: follow JSON:API `links.next` with an optional record cap
//! - **Token Pagination**: walk OAI-PMH resumption tokens to exhaustion
//! - **Backpressure**: wait out `Retry-After` on 429/503 and retry the same request
//! - **Hydration**: fetch the full document behind every listed record
//! - **Partial Results**: a fatal page keeps everything collected before it
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use paged_harvest::{FetchSession, SessionConfig, SessionOutcome};
//!
//! #[tokio::main]
//! async fn main() -> paged_harvest::Result<()> {
//!     let config = SessionConfig::builder()
//!         .start_date(paged_harvest::parse_date("2024-01-01").unwrap())
//!         .max_results(500)
//!         .build();
//!
//!     match FetchSession::new(config).run().await? {
//!         SessionOutcome::Completed { records, stats } => {
//!             println!("{} records in {}ms", records.len(), stats.duration_ms);
//!         }
//!         other => eprintln!("session ended {}", other.label()),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          FetchSession                           │
//! │  validate → walk → dedupe → hydrate → SessionOutcome + RunStats │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌───────────────┬──────────────┴──┬───────────────┬───────────────┐
//! │  Pagination   │      HTTP       │    Decode     │   Hydrate     │
//! ├───────────────┼─────────────────┼───────────────┼───────────────┤
//! │ Link walker   │ Transport       │ JSON:API list │ Worker pool   │
//! │ Token walker  │ Backpressure    │ JSON:API item │ Shared gate   │
//! │               │ Rate limit      │ OAI-PMH XML   │               │
//! └───────────────┴─────────────────┴───────────────┴───────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Bearer token authentication
pub mod auth;

/// Single-request transport, backpressure and rate limiting
pub mod http;

/// Link and token page walkers
pub mod pagination;

/// Response decoders (JSON:API, OAI-PMH XML)
pub mod decode;

/// Per-record detail fetching
pub mod hydrate;

/// Session orchestration
pub mod engine;

/// Session configuration
pub mod config;

/// Preprint provider lookup
pub mod providers;

/// JSON Lines output
pub mod output;

/// Command-line interface
pub mod cli;

#[cfg(test)]
mod testing;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::{SessionConfig, SourceKind};
pub use engine::{FetchSession, RunStats, SessionOutcome};
pub use hydrate::{HydrationOutcome, RecordHydrator};
pub use pagination::{LinkPageWalker, PageRequest, PageResult, TokenPageWalker};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
