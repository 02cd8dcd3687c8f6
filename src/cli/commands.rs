//! CLI commands and argument parsing

use crate::config::SourceKind;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Bulk fetcher for paginated, rate-limited APIs
#[derive(Parser, Debug)]
#[command(name = "paged-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Session configuration file (YAML or JSON)
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format for summaries
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch every record in the requested range
    Fetch(FetchArgs),

    /// Validate the session configuration
    Validate(FetchArgs),

    /// Print the preprint server behind a provider URL
    Provider {
        /// Provider URL
        url: String,
    },
}

/// Session overrides shared by `fetch` and `validate`
///
/// Anything given here replaces the value from `--config`.
#[derive(Args, Debug, Clone, Default)]
pub struct FetchArgs {
    /// Source API
    #[arg(long)]
    pub source: Option<SourceKind>,

    /// Earliest creation date (YYYY-MM-DD)
    #[arg(short, long)]
    pub start_date: Option<NaiveDate>,

    /// Latest creation date (YYYY-MM-DD)
    #[arg(short, long)]
    pub end_date: Option<NaiveDate>,

    /// Maximum number of records
    #[arg(short, long)]
    pub max_results: Option<usize>,

    /// Bearer token
    #[arg(short, long, env = "OSF_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Skip the per-record detail pass
    #[arg(long)]
    pub no_hydrate: bool,

    /// Detail requests in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Client-side request quota
    #[arg(long, conflicts_with = "requests_per_hour")]
    pub requests_per_second: Option<u32>,

    /// Client-side hourly request quota
    #[arg(long)]
    pub requests_per_hour: Option<u32>,

    /// Listing endpoint override
    #[arg(long)]
    pub base_url: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
