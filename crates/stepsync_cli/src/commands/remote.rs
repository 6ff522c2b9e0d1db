//! Remote command implementation.

use serde_json::json;
use stepsync_engine::RemoteSink;

use super::{sink, CommandResult, OutputFormat};

/// Prints the number of samples held by the remote sink.
pub async fn run(server: &str, format: OutputFormat) -> CommandResult {
    let listed = sink(server)?.list().await?;
    let first = listed.samples.iter().map(|s| s.start_date).min();
    let last = listed.samples.iter().map(|s| s.end_date).max();

    match format {
        OutputFormat::Json => {
            let report = json!({
                "server": server,
                "total": listed.total,
                "first": first,
                "last": last,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            println!("{server}: {} samples", listed.total);
            if let (Some(first), Some(last)) = (first, last) {
                println!("  Span: {first} .. {last}");
            }
        }
    }
    Ok(())
}
