//! Sync command implementation.

use std::path::Path;

use stepsync_engine::{SyncConfig, SyncState};
use tracing::{info, warn};

use super::{orchestrator, CommandResult, SourceArgs};

/// Uploads unsynced chunks. Ctrl-C pauses the run; progress is kept in the
/// ledger and a later run picks up the remaining chunks.
pub async fn run(
    ledger: &Path,
    server: &str,
    source: &SourceArgs,
    concurrency: usize,
) -> CommandResult {
    let config = SyncConfig::new().with_max_concurrent_chunks(concurrency);
    let orchestrator = orchestrator(ledger, server, source, config)?;

    if !orchestrator.check_health().await {
        return Err(format!("remote sink at {server} is unreachable").into());
    }

    let mut updates = orchestrator.subscribe();
    let reporter = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            if let SyncState::Syncing { progress } = state {
                info!(%progress, "sync progress");
            }
        }
    });

    let sync = orchestrator.sync();
    tokio::pin!(sync);
    let outcome = tokio::select! {
        outcome = &mut sync => outcome,
        _ = tokio::signal::ctrl_c() => {
            if let Err(e) = orchestrator.pause() {
                warn!(error = %e, "pause ignored");
            }
            sync.await
        }
    };
    reporter.abort();

    let progress = outcome?;
    match orchestrator.state() {
        SyncState::Paused { .. } => println!("Paused at {progress} chunks; rerun to resume"),
        state => println!("Sync {}: {progress} chunks", state.name()),
    }

    let stats = orchestrator.stats();
    println!("  Samples sent: {}", stats.samples_sent);
    Ok(())
}
