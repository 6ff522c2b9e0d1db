//! Health command implementation.

use stepsync_engine::RemoteSink;

use super::{sink, CommandResult};

/// Probes the remote sink.
pub async fn run(server: &str) -> CommandResult {
    let response = sink(server)?.health().await?;
    println!("{server}: {}", response.status);
    Ok(())
}
