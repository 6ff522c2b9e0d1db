//! Configuration for discovery, sync and the remote sink client.

use std::time::Duration;

use crate::error::{SyncError, SyncResult};

/// Default unit budget per chunk.
pub const DEFAULT_BUDGET: u64 = 10_000;

/// Default number of concurrent chunk transfers.
pub const DEFAULT_MAX_CONCURRENT_CHUNKS: usize = 3;

/// Configuration for the interval partitioner.
#[derive(Debug, Clone)]
pub struct PartitionConfig {
    /// Target unit total per chunk.
    pub budget: u64,
    /// Width of the fixed buckets scanned during accumulation.
    pub bucket_interval: chrono::Duration,
    /// Boundary compaction stops once the search window is this narrow.
    /// Ranges not longer than this become a single chunk.
    pub min_granularity: chrono::Duration,
}

impl PartitionConfig {
    /// Creates a partition configuration with the given budget.
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            bucket_interval: chrono::Duration::minutes(15),
            min_granularity: chrono::Duration::days(1),
        }
    }

    /// Sets the bucket interval.
    pub fn with_bucket_interval(mut self, interval: chrono::Duration) -> Self {
        self.bucket_interval = interval;
        self
    }

    /// Sets the minimum compaction granularity.
    pub fn with_min_granularity(mut self, granularity: chrono::Duration) -> Self {
        self.min_granularity = granularity;
        self
    }

    /// Checks that the configuration can drive a partition run.
    pub fn validate(&self) -> SyncResult<()> {
        if self.budget == 0 {
            return Err(SyncError::InvalidArgument(
                "budget must be greater than zero".into(),
            ));
        }
        if self.bucket_interval <= chrono::Duration::zero() {
            return Err(SyncError::InvalidArgument(
                "bucket interval must be positive".into(),
            ));
        }
        if self.min_granularity <= chrono::Duration::zero() {
            return Err(SyncError::InvalidArgument(
                "minimum granularity must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BUDGET)
    }
}

/// When buffered synced marks are flushed to the ledger.
#[derive(Debug, Clone)]
pub struct MarkPolicy {
    /// Flush once this many marks are buffered.
    pub max_pending: usize,
    /// Flush once no mark has arrived for this long.
    pub idle_flush: Duration,
}

impl MarkPolicy {
    /// Creates a mark policy.
    pub fn new(max_pending: usize, idle_flush: Duration) -> Self {
        Self {
            max_pending: max_pending.max(1),
            idle_flush,
        }
    }

    /// Flushes every mark immediately.
    pub fn immediate() -> Self {
        Self::new(1, Duration::ZERO)
    }
}

impl Default for MarkPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_millis(250))
    }
}

/// Configuration for the sync orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Partitioner settings used by discovery.
    pub partition: PartitionConfig,
    /// Worker pool size.
    pub max_concurrent_chunks: usize,
    /// Synced-mark batching.
    pub marks: MarkPolicy,
}

impl SyncConfig {
    /// Creates a sync configuration with default settings.
    pub fn new() -> Self {
        Self {
            partition: PartitionConfig::default(),
            max_concurrent_chunks: DEFAULT_MAX_CONCURRENT_CHUNKS,
            marks: MarkPolicy::default(),
        }
    }

    /// Sets the partitioner settings.
    pub fn with_partition(mut self, partition: PartitionConfig) -> Self {
        self.partition = partition;
        self
    }

    /// Sets the chunk budget.
    pub fn with_budget(mut self, budget: u64) -> Self {
        self.partition.budget = budget;
        self
    }

    /// Sets the worker pool size. Zero is treated as one.
    pub fn with_max_concurrent_chunks(mut self, max: usize) -> Self {
        self.max_concurrent_chunks = max.max(1);
        self
    }

    /// Sets the synced-mark batching policy.
    pub fn with_marks(mut self, marks: MarkPolicy) -> Self {
        self.marks = marks;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Configuration for [`HttpSink`](crate::HttpSink).
#[derive(Debug, Clone)]
pub struct HttpSinkConfig {
    /// Base URL of the remote sink, e.g. `http://127.0.0.1:8000`.
    pub server_url: String,
    /// Timeout for append, list and delete requests.
    pub request_timeout: Duration,
    /// Timeout for the health probe.
    pub health_timeout: Duration,
}

impl HttpSinkConfig {
    /// Creates a client configuration for the given base URL.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            request_timeout: Duration::from_secs(30),
            health_timeout: Duration::from_secs(5),
        }
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the health probe timeout.
    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.partition.budget, 10_000);
        assert_eq!(config.partition.bucket_interval, chrono::Duration::minutes(15));
        assert_eq!(config.partition.min_granularity, chrono::Duration::days(1));
        assert_eq!(config.max_concurrent_chunks, 3);
        assert_eq!(config.marks.max_pending, 10);
        assert_eq!(config.marks.idle_flush, Duration::from_millis(250));
    }

    #[test]
    fn builder_pattern() {
        let config = SyncConfig::new()
            .with_budget(500)
            .with_max_concurrent_chunks(0)
            .with_marks(MarkPolicy::immediate());

        assert_eq!(config.partition.budget, 500);
        assert_eq!(config.max_concurrent_chunks, 1);
        assert_eq!(config.marks.max_pending, 1);
    }

    #[test]
    fn validate_rejects_zero_budget() {
        assert!(PartitionConfig::new(0).validate().is_err());
        assert!(PartitionConfig::new(1).validate().is_ok());
        assert!(PartitionConfig::new(1)
            .with_bucket_interval(chrono::Duration::zero())
            .validate()
            .is_err());
    }

    #[test]
    fn http_sink_timeouts() {
        let config = HttpSinkConfig::new("http://localhost:8000")
            .with_health_timeout(Duration::from_secs(1));
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.health_timeout, Duration::from_secs(1));
    }
}
