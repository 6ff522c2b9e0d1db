//! Discover command implementation.

use std::path::Path;
use std::time::Instant;

use chrono::Duration;
use stepsync_engine::{PartitionConfig, SyncConfig};

use super::{orchestrator, CommandResult, SourceArgs};

/// Partitions the source window and replaces the ledger contents.
pub async fn run(
    ledger: &Path,
    server: &str,
    source: &SourceArgs,
    budget: u64,
    bucket_minutes: i64,
) -> CommandResult {
    if bucket_minutes <= 0 {
        return Err("--bucket-minutes must be positive".into());
    }
    let partition =
        PartitionConfig::new(budget).with_bucket_interval(Duration::minutes(bucket_minutes));
    let config = SyncConfig::new().with_partition(partition);
    let orchestrator = orchestrator(ledger, server, source, config)?;

    let range = source.range()?;
    let started = Instant::now();
    let progress = orchestrator.discover(range).await?;

    println!("Discovered {} chunks over {}", progress.total_count, range);
    println!("  Ledger:  {}", ledger.display());
    println!("  Elapsed: {:.2?}", started.elapsed());
    Ok(())
}
