//! CLI command implementations.

pub mod discover;
pub mod health;
pub mod remote;
pub mod reset;
pub mod serve;
pub mod status;
pub mod sync;

use std::path::Path;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};
use clap::{Args, ValueEnum};
use stepsync_engine::{
    HttpSink, HttpSinkConfig, SyncConfig, SyncOrchestrator, SyntheticConfig, SyntheticSource,
};
use stepsync_ledger::{DateRange, FileLedger};

/// Boxed error used by every command.
pub type CommandResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

/// Orchestrator wired to the synthetic source, the HTTP sink and a file ledger.
pub type CliOrchestrator =
    SyncOrchestrator<Arc<SyntheticSource>, Arc<SyntheticSource>, HttpSink, FileLedger>;

/// Output format for reporting commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    Text,
    /// Pretty-printed JSON
    Json,
}

/// Flags describing the synthetic history.
///
/// The same seed and window must be passed to `discover` and `sync` so that
/// chunks fetch the events they were sized for.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Seed of the synthetic event generator
    #[arg(long, default_value = "1")]
    pub seed: u64,

    /// First day of history (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day of history (YYYY-MM-DD, exclusive); defaults to tomorrow
    #[arg(long)]
    pub to: Option<NaiveDate>,
}

impl SourceArgs {
    /// Resolves the history window. Without `--from`, a year back from `--to`.
    pub fn range(&self) -> CommandResult<DateRange> {
        let to = match self.to {
            Some(to) => to,
            None => Utc::now()
                .date_naive()
                .checked_add_days(Days::new(1))
                .ok_or("date out of range")?,
        };
        let from = match self.from {
            Some(from) => from,
            None => to.checked_sub_days(Days::new(365)).ok_or("date out of range")?,
        };
        let start = from.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = to.and_time(chrono::NaiveTime::MIN).and_utc();
        Ok(DateRange::new(start, end)?)
    }

    /// Builds the synthetic source over the window.
    pub fn source(&self) -> CommandResult<Arc<SyntheticSource>> {
        let config = SyntheticConfig::new(self.seed, self.range()?);
        Ok(Arc::new(SyntheticSource::new(config)?))
    }
}

/// Builds the HTTP sink client.
pub fn sink(server: &str) -> CommandResult<HttpSink> {
    Ok(HttpSink::new(HttpSinkConfig::new(server))?)
}

/// Builds an orchestrator and rederives its state from the ledger.
pub fn orchestrator(
    ledger: &Path,
    server: &str,
    source: &SourceArgs,
    config: SyncConfig,
) -> CommandResult<CliOrchestrator> {
    let source = source.source()?;
    let ledger = FileLedger::open_with_create_dirs(ledger)?;
    let orchestrator =
        SyncOrchestrator::new(config, Arc::clone(&source), source, sink(server)?, ledger);
    orchestrator.restore()?;
    Ok(orchestrator)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(from: Option<&str>, to: Option<&str>) -> SourceArgs {
        SourceArgs {
            seed: 1,
            from: from.map(|d| d.parse().unwrap()),
            to: to.map(|d| d.parse().unwrap()),
        }
    }

    #[test]
    fn explicit_window() {
        let range = args(Some("2024-01-01"), Some("2024-01-31")).range().unwrap();
        assert_eq!(range.start().to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(range.duration(), chrono::Duration::days(30));
    }

    #[test]
    fn defaults_to_a_year() {
        let range = args(None, Some("2024-06-01")).range().unwrap();
        assert_eq!(range.duration(), chrono::Duration::days(365));
    }

    #[test]
    fn inverted_window_is_rejected() {
        assert!(args(Some("2024-02-01"), Some("2024-01-01")).range().is_err());
    }
}
