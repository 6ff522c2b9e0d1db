//! Remote sink abstraction.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use stepsync_protocol::{AppendResponse, DeleteResponse, HealthResponse, ListResponse, Sample};

use crate::error::{SyncError, SyncResult};

/// The append-only store receiving converted samples.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-memory mock for testing, etc.).
#[async_trait]
pub trait RemoteSink: Send + Sync {
    /// Probes reachability. Implementations should use a short timeout.
    async fn health(&self) -> SyncResult<HealthResponse>;

    /// Appends a batch of samples in one request.
    async fn append(&self, samples: Vec<Sample>) -> SyncResult<AppendResponse>;

    /// Lists every stored sample.
    async fn list(&self) -> SyncResult<ListResponse>;

    /// Deletes every stored sample. Idempotent.
    async fn delete_all(&self) -> SyncResult<DeleteResponse>;
}

#[async_trait]
impl<T: RemoteSink + ?Sized> RemoteSink for Arc<T> {
    async fn health(&self) -> SyncResult<HealthResponse> {
        (**self).health().await
    }

    async fn append(&self, samples: Vec<Sample>) -> SyncResult<AppendResponse> {
        (**self).append(samples).await
    }

    async fn list(&self) -> SyncResult<ListResponse> {
        (**self).list().await
    }

    async fn delete_all(&self) -> SyncResult<DeleteResponse> {
        (**self).delete_all().await
    }
}

/// An in-memory sink for testing.
///
/// Records every accepted batch, counts append calls (including rejected
/// ones) and supports failure injection.
#[derive(Debug)]
pub struct MockSink {
    connected: AtomicBool,
    append_calls: AtomicUsize,
    fail_appends: AtomicUsize,
    fail_deletes: AtomicBool,
    latency: Mutex<Option<Duration>>,
    batches: Mutex<Vec<Vec<Sample>>>,
}

impl MockSink {
    /// Creates a new, connected mock sink.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            append_calls: AtomicUsize::new(0),
            fail_appends: AtomicUsize::new(0),
            fail_deletes: AtomicBool::new(false),
            latency: Mutex::new(None),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Rejects the next `count` appends with a 500.
    pub fn fail_next_appends(&self, count: usize) {
        self.fail_appends.store(count, Ordering::SeqCst);
    }

    /// Makes `delete_all` fail until cleared.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Delays every append by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Returns the number of append calls received.
    pub fn append_calls(&self) -> usize {
        self.append_calls.load(Ordering::SeqCst)
    }

    /// Returns the accepted batches in arrival order.
    pub fn batches(&self) -> Vec<Vec<Sample>> {
        self.batches.lock().clone()
    }

    /// Returns every accepted sample.
    pub fn samples(&self) -> Vec<Sample> {
        self.batches.lock().iter().flatten().cloned().collect()
    }

    /// Returns the number of accepted samples.
    pub fn sample_count(&self) -> usize {
        self.batches.lock().iter().map(Vec::len).sum()
    }

    fn check_connected(&self) -> SyncResult<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SyncError::NotConnected)
        }
    }
}

impl Default for MockSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteSink for MockSink {
    async fn health(&self) -> SyncResult<HealthResponse> {
        self.check_connected()?;
        Ok(HealthResponse::ok())
    }

    async fn append(&self, samples: Vec<Sample>) -> SyncResult<AppendResponse> {
        self.check_connected()?;
        self.append_calls.fetch_add(1, Ordering::SeqCst);

        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let injected = self
            .fail_appends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(SyncError::Server {
                status: 500,
                message: "Server error: injected failure".into(),
            });
        }

        let saved = samples.len();
        self.batches.lock().push(samples);
        Ok(AppendResponse::success(saved))
    }

    async fn list(&self) -> SyncResult<ListResponse> {
        self.check_connected()?;
        Ok(ListResponse::new(self.samples()))
    }

    async fn delete_all(&self) -> SyncResult<DeleteResponse> {
        self.check_connected()?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(SyncError::Server {
                status: 500,
                message: "Server error: injected failure".into(),
            });
        }
        let mut batches = self.batches.lock();
        let existed = !batches.is_empty();
        batches.clear();
        Ok(DeleteResponse::new(existed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample(n: u64) -> Sample {
        let start = Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap();
        Sample {
            uuid: format!("00000000-0000-0000-0000-{n:012}"),
            start_date: start,
            end_date: start + chrono::Duration::minutes(5),
            count: n,
            source_bundle_id: "com.example".into(),
            source_device_name: None,
        }
    }

    #[tokio::test]
    async fn records_batches() {
        let sink = MockSink::new();
        let response = sink.append(vec![sample(1), sample(2)]).await.unwrap();
        assert_eq!(response.saved, 2);
        sink.append(vec![sample(3)]).await.unwrap();

        assert_eq!(sink.append_calls(), 2);
        assert_eq!(sink.sample_count(), 3);
        assert_eq!(sink.list().await.unwrap().total, 3);
    }

    #[tokio::test]
    async fn injected_failures_are_counted() {
        let sink = MockSink::new();
        sink.fail_next_appends(1);

        let err = sink.append(vec![sample(1)]).await.unwrap_err();
        assert!(err.is_retryable());
        sink.append(vec![sample(1)]).await.unwrap();

        assert_eq!(sink.append_calls(), 2);
        assert_eq!(sink.sample_count(), 1);
    }

    #[tokio::test]
    async fn latency_delays_acceptance() {
        let sink = Arc::new(MockSink::new());
        sink.set_latency(Some(Duration::from_millis(200)));

        let pending = tokio::spawn({
            let sink = Arc::clone(&sink);
            async move { sink.append(vec![sample(1)]).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.append_calls(), 1);
        assert_eq!(sink.sample_count(), 0);

        assert_eq!(pending.await.unwrap().unwrap().saved, 1);
        assert_eq!(sink.sample_count(), 1);

        sink.set_latency(None);
        let quick = sink.append(vec![sample(2)]);
        assert!(tokio::time::timeout(Duration::from_millis(100), quick).await.is_ok());
    }

    #[tokio::test]
    async fn not_connected() {
        let sink = MockSink::new();
        sink.set_connected(false);
        assert!(matches!(
            sink.health().await,
            Err(SyncError::NotConnected)
        ));
        assert!(matches!(
            sink.append(vec![]).await,
            Err(SyncError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let sink = MockSink::new();
        sink.append(vec![sample(1)]).await.unwrap();

        let first = sink.delete_all().await.unwrap();
        let second = sink.delete_all().await.unwrap();
        assert_ne!(first.message, second.message);
        assert_eq!(sink.sample_count(), 0);
    }
}
