//! Deterministic synthetic data source.
//!
//! Every hour of the configured history independently decides whether it
//! holds an event, drawing from a `StdRng` seeded with the configured seed
//! mixed with the absolute hour index. Events are therefore a pure function
//! of `(seed, hour)`: the same window returns the same events no matter how
//! often, in which order or in which process it is queried.

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stepsync_ledger::DateRange;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::source::{AggregateOracle, AggregateResult, RawEvent, RawFetchOracle};

const SECONDS_PER_HOUR: i64 = 3_600;

/// Configuration for [`SyntheticSource`].
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Seed of the generator.
    pub seed: u64,
    /// Window outside of which no event exists.
    pub history: DateRange,
    /// Probability that a daytime hour holds an event. Night hours use a
    /// tenth of it.
    pub activity: f64,
    /// Smallest event size.
    pub min_units: u64,
    /// Largest event size.
    pub max_units: u64,
    /// Source identifier attached to every event.
    pub source_id: String,
    /// Device name attached to every event.
    pub device_name: Option<String>,
}

impl SyntheticConfig {
    /// Creates a configuration with typical walking activity.
    pub fn new(seed: u64, history: DateRange) -> Self {
        Self {
            seed,
            history,
            activity: 0.6,
            min_units: 20,
            max_units: 1_500,
            source_id: "com.stepsync.synthetic".into(),
            device_name: Some("Synthetic Device".into()),
        }
    }

    /// Sets the activity probability.
    pub fn with_activity(mut self, activity: f64) -> Self {
        self.activity = activity;
        self
    }

    /// Sets the event size bounds.
    pub fn with_units(mut self, min_units: u64, max_units: u64) -> Self {
        self.min_units = min_units;
        self.max_units = max_units;
        self
    }

    /// Sets the source identifier.
    pub fn with_source_id(mut self, source_id: impl Into<String>) -> Self {
        self.source_id = source_id.into();
        self
    }

    /// Sets the device name.
    pub fn with_device_name(mut self, device_name: Option<String>) -> Self {
        self.device_name = device_name;
        self
    }
}

/// A reproducible source implementing both oracles.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    config: SyntheticConfig,
}

impl SyntheticSource {
    /// Creates a source.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidArgument`] if the activity is not a
    /// probability or the unit bounds are inverted.
    pub fn new(config: SyntheticConfig) -> SyncResult<Self> {
        if !(0.0..=1.0).contains(&config.activity) {
            return Err(SyncError::InvalidArgument(format!(
                "activity must be within [0, 1], got {}",
                config.activity
            )));
        }
        if config.min_units > config.max_units {
            return Err(SyncError::InvalidArgument(format!(
                "min units {} exceed max units {}",
                config.min_units, config.max_units
            )));
        }
        Ok(Self { config })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Returns the events starting inside `range`, ordered by start.
    pub fn events(&self, range: DateRange) -> Vec<RawEvent> {
        let Some(window) = range.intersection(&self.config.history) else {
            return Vec::new();
        };
        let first = window.start().timestamp().div_euclid(SECONDS_PER_HOUR);
        let last = (window.end().timestamp() - 1).div_euclid(SECONDS_PER_HOUR);

        (first..=last)
            .filter_map(|hour| self.event_in_hour(hour))
            .filter(|event| window.contains(event.start_date))
            .collect()
    }

    fn event_in_hour(&self, hour: i64) -> Option<RawEvent> {
        let hour_start = Utc.timestamp_opt(hour * SECONDS_PER_HOUR, 0).single()?;
        let mut rng = StdRng::seed_from_u64(mix(self.config.seed, hour));

        let activity = if (6..22).contains(&hour_start.hour()) {
            self.config.activity
        } else {
            self.config.activity / 10.0
        };
        if !rng.gen_bool(activity) {
            return None;
        }

        let units = rng.gen_range(self.config.min_units..=self.config.max_units);
        let offset = Duration::seconds(rng.gen_range(0..50 * 60));
        let length = Duration::seconds(rng.gen_range(60..=10 * 60));
        let id = Uuid::from_bytes(rng.gen());

        let start_date = hour_start + offset;
        Some(RawEvent {
            id,
            start_date,
            end_date: start_date + length,
            units,
            source_id: self.config.source_id.clone(),
            device_name: self.config.device_name.clone(),
        })
    }
}

/// SplitMix64 finaliser over the seed and hour.
fn mix(seed: u64, hour: i64) -> u64 {
    let mut z = seed ^ (hour as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn tightened(events: &[RawEvent], range: DateRange) -> Option<DateRange> {
    let first: DateTime<Utc> = events.first()?.start_date;
    let last = events.last()?;
    DateRange::new(first, last.end_date.min(range.end())).ok()
}

#[async_trait]
impl AggregateOracle for SyntheticSource {
    async fn aggregate(&self, range: DateRange) -> SyncResult<AggregateResult> {
        let events = self.events(range);
        let count = events.iter().map(|e| e.units).sum();
        Ok(AggregateResult {
            count,
            tightened: tightened(&events, range),
        })
    }

    async fn bucket_counts(
        &self,
        range: DateRange,
        interval: chrono::Duration,
    ) -> SyncResult<Vec<u64>> {
        let buckets = range.buckets(interval);
        let mut counts = vec![0u64; buckets.len()];
        for event in self.events(range) {
            let index = buckets.partition_point(|b| b.end() <= event.start_date);
            if let Some(count) = counts.get_mut(index) {
                *count += event.units;
            }
        }
        Ok(counts)
    }
}

#[async_trait]
impl RawFetchOracle for SyntheticSource {
    async fn fetch(&self, range: DateRange) -> SyncResult<Vec<RawEvent>> {
        Ok(self.events(range))
    }
}
