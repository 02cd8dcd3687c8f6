//! CLI module
//!
//! Command-line interface for fetch sessions.
//!
//! # Commands
//!
//! - `fetch` - Run a bulk fetch and write the records to disk
//! - `validate` - Resolve and check a session config without any I/O
//! - `provider` - Look up the preprint server behind a provider URL

mod commands;
mod runner;

pub use commands::{Cli, Commands, FetchArgs, OutputFormat};
pub use runner::Runner;
