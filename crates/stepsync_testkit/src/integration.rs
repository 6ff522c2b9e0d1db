//! Cross-crate integration test helpers.
//!
//! Provides an in-process remote sink server and orchestrator builders
//! wired to the instrumented oracle.

use std::path::Path;
use std::sync::Arc;

use stepsync_engine::{HttpSink, HttpSinkConfig, MockSink, RemoteSink, SyncConfig, SyncOrchestrator};
use stepsync_ledger::InMemoryLedger;
use stepsync_server::{ServerConfig, ServerResult, SinkServer};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::oracle::EventOracle;

/// Orchestrator over the instrumented oracle, a given sink and an in-memory ledger.
pub type TestOrchestrator<S> =
    SyncOrchestrator<Arc<EventOracle>, Arc<EventOracle>, S, InMemoryLedger>;

/// Builds an orchestrator using `oracle` for both query shapes.
pub fn orchestrator_with<S>(oracle: &Arc<EventOracle>, sink: S, config: SyncConfig) -> TestOrchestrator<S>
where
    S: RemoteSink + 'static,
{
    SyncOrchestrator::new(
        config,
        Arc::clone(oracle),
        Arc::clone(oracle),
        sink,
        InMemoryLedger::new(),
    )
}

/// Builds an orchestrator with a fresh [`MockSink`].
pub fn mock_orchestrator(oracle: &Arc<EventOracle>, config: SyncConfig) -> TestOrchestrator<MockSink> {
    orchestrator_with(oracle, MockSink::new(), config)
}

/// A remote sink server on an ephemeral localhost port with a temporary
/// data directory. Shuts down when dropped.
pub struct TestServer {
    base_url: String,
    dir: TempDir,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<ServerResult<()>>>,
}

impl TestServer {
    /// Starts a server.
    pub async fn start() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let config = ServerConfig::default().with_data_dir(dir.path());
        let server = SinkServer::new(config).expect("Failed to create server");

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local address");

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(server.serve_with_shutdown(listener, async {
            let _ = rx.await;
        }));

        Self {
            base_url: format!("http://{addr}"),
            dir,
            shutdown: Some(tx),
            task: Some(task),
        }
    }

    /// Returns the base URL, e.g. `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the data directory.
    pub fn data_dir(&self) -> &Path {
        self.dir.path()
    }

    /// Returns an HTTP sink client pointed at this server.
    pub fn sink(&self) -> HttpSink {
        HttpSink::new(HttpSinkConfig::new(self.base_url.clone())).expect("Failed to build sink")
    }

    /// Shuts the server down and waits for it to stop.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            task.await
                .expect("server task panicked")
                .expect("server failed");
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}
