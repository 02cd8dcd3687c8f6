//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, FetchArgs, OutputFormat};
use crate::config::{SessionConfig, SourceKind};
use crate::engine::{FetchSession, SessionOutcome};
use crate::error::{Result, ResultExt};
use crate::output::{output_file_name, write_records_to_jsonl, DEFAULT_OUTPUT_DIR};
use crate::providers::{provider_label, provider_of};
use crate::types::Record;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command
    pub async fn run(&self) -> Result<()> {
        match &self.cli.command {
            Commands::Fetch(args) => self.fetch(args).await,
            Commands::Validate(args) => self.validate(args),
            Commands::Provider { url } => {
                self.output_message(&json!({
                    "type": "PROVIDER",
                    "url": url,
                    "provider": provider_label(url),
                }));
                Ok(())
            }
        }
    }

    /// Merge the config file with command line overrides
    pub fn session_config(&self, args: &FetchArgs) -> Result<SessionConfig> {
        let mut config = match &self.cli.config {
            Some(path) => SessionConfig::from_file(path)?,
            None => SessionConfig::default(),
        };

        if let Some(source) = args.source {
            config.source = source;
        }
        if let Some(start) = args.start_date {
            config.start_date = Some(start);
        }
        if let Some(end) = args.end_date {
            config.end_date = Some(end);
        }
        if let Some(max) = args.max_results {
            config.max_results = Some(max);
        }
        if let Some(token) = &args.token {
            config.token = Some(token.clone());
        }
        if args.no_hydrate {
            config.hydrate = false;
        }
        if let Some(concurrency) = args.concurrency {
            config.concurrency = concurrency;
        }
        if let Some(rps) = args.requests_per_second {
            config.requests_per_second = Some(rps);
            config.requests_per_hour = None;
        }
        if let Some(rph) = args.requests_per_hour {
            config.requests_per_hour = Some(rph);
            config.requests_per_second = None;
        }
        if let Some(url) = &args.base_url {
            config.base_url = Some(url.clone());
        }

        Ok(config)
    }

    /// Validate the resolved configuration
    fn validate(&self, args: &FetchArgs) -> Result<()> {
        let config = self.session_config(args)?;
        config.validate()?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Session for {} at {} is valid",
                    config.source,
                    config.base_url()
                )
            }
        }));
        Ok(())
    }

    /// Run a fetch session and write its records
    async fn fetch(&self, args: &FetchArgs) -> Result<()> {
        let config = self.session_config(args)?;
        config.validate()?;

        if config.source == SourceKind::Osf && !config.auth().is_authenticated() {
            warn!("No OSF token set (OSF_TOKEN or --token); requests are anonymous");
        }

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, finishing with what has been fetched");
                on_interrupt.cancel();
            }
        });

        let outcome = FetchSession::new(config.clone())
            .with_cancellation(cancel)
            .run()
            .await;
        interrupt.abort();
        let outcome = outcome?;

        let output = if outcome.records().is_empty() {
            None
        } else {
            let dir = args
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
            let name = output_file_name(
                config.source,
                &config.date_range(),
                config.max_results,
                chrono::Local::now().naive_local(),
            );
            let path = dir.join(name);
            let written = write_records_to_jsonl(&path, outcome.records())
                .with_context(|| format!("Failed to save records to {}", path.display()))?;
            info!("Wrote {} records to {}", written, path.display());
            Some(path)
        };

        if config.source == SourceKind::Osf && config.hydrate {
            for (provider, count) in provider_counts(outcome.records()) {
                info!("{}: {}", provider, count);
            }
        }

        self.output_message(&summary(&outcome, output.as_ref()));

        match outcome {
            SessionOutcome::Empty { error, .. } => Err(error),
            _ => Ok(()),
        }
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}

/// Records per preprint server, alphabetically
fn provider_counts(records: &[Record]) -> BTreeMap<&'static str, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(provider_of(record)).or_insert(0) += 1;
    }
    counts
}

/// Final summary message
fn summary(outcome: &SessionOutcome, output: Option<&PathBuf>) -> Value {
    json!({
        "type": "SUMMARY",
        "outcome": outcome.label(),
        "stats": outcome.stats(),
        "output": output.map(|p| p.display().to_string()),
        "error": outcome.error().map(ToString::to_string),
        "error_kind": outcome.error().map(|e| format!("{:?}", e.kind())),
    })
}
