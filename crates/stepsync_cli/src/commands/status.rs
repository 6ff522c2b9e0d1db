//! Status command implementation.

use std::path::Path;

use serde::Serialize;
use stepsync_engine::SyncState;
use stepsync_ledger::{FileLedger, Ledger};

use super::{CommandResult, OutputFormat};

/// Progress recorded in a ledger.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    /// Ledger path.
    pub ledger: String,
    /// Rederived state name.
    pub state: &'static str,
    /// Chunks acknowledged by the remote sink.
    pub synced: usize,
    /// Chunks discovered.
    pub total: usize,
    /// Units estimated by discovery across all chunks.
    pub units: u64,
    /// First and last instant covered, if any chunks exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<(String, String)>,
}

/// Runs the status command.
pub fn run(path: &Path, format: OutputFormat) -> CommandResult {
    if !path.exists() {
        return Err(format!("No ledger found at {}", path.display()).into());
    }
    let ledger = FileLedger::open(path)?;
    let chunks = ledger.chunks()?;
    let progress = ledger.progress()?;
    let state = SyncState::from_progress(progress);

    let report = StatusReport {
        ledger: path.display().to_string(),
        state: state.name(),
        synced: progress.synced_count,
        total: progress.total_count,
        units: chunks.iter().map(|c| c.unit_count).sum(),
        window: chunks
            .first()
            .zip(chunks.last())
            .map(|(first, last)| (first.start_date.to_rfc3339(), last.end_date.to_rfc3339())),
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Text => print_text_output(&report, progress.fraction()),
    }
    Ok(())
}

fn print_text_output(report: &StatusReport, fraction: f64) {
    println!("Ledger: {}", report.ledger);
    println!("  State:  {}", report.state);
    println!(
        "  Chunks: {}/{} ({:.1}%)",
        report.synced,
        report.total,
        fraction * 100.0
    );
    println!("  Units:  {}", report.units);
    if let Some((start, end)) = &report.window {
        println!("  Window: {start} .. {end}");
    }
}
