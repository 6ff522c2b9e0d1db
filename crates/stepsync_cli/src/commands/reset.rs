//! Reset command implementation.

use std::path::Path;

use stepsync_engine::SyncConfig;

use super::{orchestrator, CommandResult, SourceArgs};

/// Deletes every remote sample, then clears the ledger.
///
/// The ledger is left untouched if the remote delete fails.
pub async fn run(ledger: &Path, server: &str, source: &SourceArgs) -> CommandResult {
    let orchestrator = orchestrator(ledger, server, source, SyncConfig::default())?;
    let before = orchestrator.progress()?;
    orchestrator.reset().await?;

    println!(
        "Reset complete; {} chunks removed from {}",
        before.total_count,
        ledger.display()
    );
    Ok(())
}
