//! Serve command implementation.

use std::net::SocketAddr;
use std::path::Path;

use stepsync_server::{ServerConfig, SinkServer};
use tokio::net::TcpListener;
use tracing::info;

use super::CommandResult;

/// Runs the remote sink server until Ctrl-C.
pub async fn run(
    bind: SocketAddr,
    data_dir: &Path,
    max_body_bytes: Option<usize>,
) -> CommandResult {
    let config = ServerConfig::new(bind)
        .with_data_dir(data_dir)
        .with_max_body_bytes(max_body_bytes);
    let server = SinkServer::new(config)?;
    let listener = TcpListener::bind(bind).await?;

    server
        .serve_with_shutdown(listener, async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutting down");
            }
        })
        .await?;
    Ok(())
}
