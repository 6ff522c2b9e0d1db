//! Source oracles and the raw event model.
//!
//! The source is only reachable through two query shapes: a cheap-ish
//! aggregate ("how many units in this window") and an expensive raw fetch
//! ("every event in this window"). Both are injected as traits so the
//! partitioner and orchestrator can run against real, synthetic or
//! instrumented sources.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use stepsync_ledger::DateRange;
use stepsync_protocol::Sample;
use uuid::Uuid;

use crate::error::SyncResult;

/// A single timestamped count event as read from the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Stable identifier, identical across re-fetches.
    pub id: Uuid,
    /// Event start.
    pub start_date: DateTime<Utc>,
    /// Event end.
    pub end_date: DateTime<Utc>,
    /// Units recorded by the event.
    pub units: u64,
    /// Identifier of the producing source.
    pub source_id: String,
    /// Optional device name.
    pub device_name: Option<String>,
}

impl RawEvent {
    /// Converts the event to its wire representation.
    pub fn to_sample(&self) -> Sample {
        Sample {
            uuid: self.id.as_hyphenated().to_string().to_uppercase(),
            start_date: self.start_date,
            end_date: self.end_date,
            count: self.units,
            source_bundle_id: self.source_id.clone(),
            source_device_name: self.device_name.clone(),
        }
    }
}

impl From<&RawEvent> for Sample {
    fn from(event: &RawEvent) -> Self {
        event.to_sample()
    }
}

/// Result of an aggregate query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AggregateResult {
    /// Total units in the queried window.
    pub count: u64,
    /// Narrower window where the data actually lies, if the source knows it.
    pub tightened: Option<DateRange>,
}

impl AggregateResult {
    /// A result with no units.
    pub const fn empty() -> Self {
        Self {
            count: 0,
            tightened: None,
        }
    }

    /// A result with a count and no tightened bounds.
    pub const fn count(count: u64) -> Self {
        Self {
            count,
            tightened: None,
        }
    }

    /// Attaches tightened bounds.
    pub fn with_tightened(mut self, tightened: DateRange) -> Self {
        self.tightened = Some(tightened);
        self
    }
}

/// Answers "total units in window".
#[async_trait]
pub trait AggregateOracle: Send + Sync {
    /// Returns the unit total for `range`.
    async fn aggregate(&self, range: DateRange) -> SyncResult<AggregateResult>;

    /// Returns the unit total of every bucket of `range.buckets(interval)`,
    /// in order.
    ///
    /// The default issues one aggregate per bucket. Sources with a
    /// collection query should override it.
    async fn bucket_counts(
        &self,
        range: DateRange,
        interval: chrono::Duration,
    ) -> SyncResult<Vec<u64>> {
        let buckets = range.buckets(interval);
        let mut counts = Vec::with_capacity(buckets.len());
        for bucket in buckets {
            counts.push(self.aggregate(bucket).await?.count);
        }
        Ok(counts)
    }
}

/// Answers "all raw events in window".
#[async_trait]
pub trait RawFetchOracle: Send + Sync {
    /// Returns the events starting inside `range`, ordered by start.
    async fn fetch(&self, range: DateRange) -> SyncResult<Vec<RawEvent>>;
}

#[async_trait]
impl<T: AggregateOracle + ?Sized> AggregateOracle for Arc<T> {
    async fn aggregate(&self, range: DateRange) -> SyncResult<AggregateResult> {
        (**self).aggregate(range).await
    }

    async fn bucket_counts(
        &self,
        range: DateRange,
        interval: chrono::Duration,
    ) -> SyncResult<Vec<u64>> {
        (**self).bucket_counts(range, interval).await
    }
}

#[async_trait]
impl<T: RawFetchOracle + ?Sized> RawFetchOracle for Arc<T> {
    async fn fetch(&self, range: DateRange) -> SyncResult<Vec<RawEvent>> {
        (**self).fetch(range).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    struct Hourly;

    #[async_trait]
    impl AggregateOracle for Hourly {
        async fn aggregate(&self, range: DateRange) -> SyncResult<AggregateResult> {
            Ok(AggregateResult::count(range.duration().num_hours() as u64))
        }
    }

    #[test]
    fn converts_to_wire_sample() {
        let id = Uuid::parse_str("6f1c1b2a-3d4e-4f50-8a9b-0c1d2e3f4a5b").unwrap();
        let event = RawEvent {
            id,
            start_date: at(8),
            end_date: at(9),
            units: 420,
            source_id: "com.example.pedometer".into(),
            device_name: None,
        };

        let sample = event.to_sample();
        assert_eq!(sample.uuid, "6F1C1B2A-3D4E-4F50-8A9B-0C1D2E3F4A5B");
        assert_eq!(sample.count, 420);
        assert_eq!(sample.source_bundle_id, "com.example.pedometer");
        assert_eq!(sample.source_device_name, None);
        assert_eq!(sample.start_date, at(8));
        assert_eq!(Sample::from(&event), sample);
    }

    #[tokio::test]
    async fn default_bucket_counts_query_each_bucket() {
        let range = DateRange::new(at(0), at(10)).unwrap();
        let counts = Hourly
            .bucket_counts(range, chrono::Duration::hours(4))
            .await
            .unwrap();
        assert_eq!(counts, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn arc_forwards() {
        let oracle = Arc::new(Hourly);
        let range = DateRange::new(at(0), at(3)).unwrap();
        assert_eq!(oracle.aggregate(range).await.unwrap().count, 3);
    }
}
