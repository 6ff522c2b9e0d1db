//! Instrumented in-memory source.
//!
//! [`EventOracle`] answers both oracle shapes from a fixed event list and
//! records how it was queried: call counts, fetched windows and the highest
//! number of fetches in flight at once. Latency and failures can be
//! injected per window.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use stepsync_engine::{AggregateOracle, AggregateResult, RawEvent, RawFetchOracle, SyncError, SyncResult};
use stepsync_ledger::DateRange;

/// A deterministic source backed by a list of events.
#[derive(Debug, Default)]
pub struct EventOracle {
    events: Vec<RawEvent>,
    report_tightened: AtomicBool,
    aggregate_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    fetch_delay: Mutex<Duration>,
    slow_from: Mutex<Option<(DateTime<Utc>, Duration)>>,
    window_delays: Mutex<Vec<(DateRange, Duration)>>,
    failing_fetches: Mutex<Vec<DateRange>>,
    aggregate_budget: Mutex<Option<usize>>,
    fetched: Mutex<Vec<DateRange>>,
}

impl EventOracle {
    /// Creates an oracle over `events`. Events are sorted by start.
    pub fn new(mut events: Vec<RawEvent>) -> Self {
        events.sort_by_key(|e| e.start_date);
        Self {
            events,
            ..Self::default()
        }
    }

    /// Creates an oracle with no events.
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Makes aggregates report tightened bounds.
    pub fn with_tightened_bounds(self) -> Self {
        self.report_tightened.store(true, Ordering::SeqCst);
        self
    }

    /// Delays every fetch by `delay`.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = delay;
    }

    /// Delays fetches of windows starting at or after `at` by `delay`
    /// instead of the default fetch delay.
    pub fn slow_fetches_from(&self, at: DateTime<Utc>, delay: Duration) {
        *self.slow_from.lock() = Some((at, delay));
    }

    /// Delays fetches of exactly `range` by `delay`. Takes precedence over
    /// the other delays.
    pub fn delay_fetch(&self, range: DateRange, delay: Duration) {
        self.window_delays.lock().push((range, delay));
    }

    /// Fails every fetch of exactly `range`.
    pub fn fail_fetch(&self, range: DateRange) {
        self.failing_fetches.lock().push(range);
    }

    /// Stops failing fetches.
    pub fn clear_fetch_failures(&self) {
        self.failing_fetches.lock().clear();
    }

    /// Lets `calls` more aggregates succeed, then fails the rest.
    pub fn fail_aggregates_after(&self, calls: usize) {
        *self.aggregate_budget.lock() = Some(calls);
    }

    /// Lets every aggregate succeed again.
    pub fn clear_aggregate_failures(&self) {
        *self.aggregate_budget.lock() = None;
    }

    /// Returns the events.
    pub fn events(&self) -> &[RawEvent] {
        &self.events
    }

    /// Returns the sum of all event units.
    pub fn total_units(&self) -> u64 {
        self.events.iter().map(|e| e.units).sum()
    }

    /// Returns the number of aggregate calls (bucket queries included).
    pub fn aggregate_calls(&self) -> usize {
        self.aggregate_calls.load(Ordering::SeqCst)
    }

    /// Returns the number of fetch calls.
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Returns the highest number of concurrent fetches observed.
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Returns the fetched windows in call order.
    pub fn fetched_ranges(&self) -> Vec<DateRange> {
        self.fetched.lock().clone()
    }

    fn in_range(&self, range: DateRange) -> &[RawEvent] {
        let from = self.events.partition_point(|e| e.start_date < range.start());
        let to = self.events.partition_point(|e| e.start_date < range.end());
        &self.events[from..to]
    }

    fn take_aggregate_budget(&self) -> SyncResult<()> {
        self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
        let mut budget = self.aggregate_budget.lock();
        match budget.as_mut() {
            Some(0) => Err(SyncError::source("injected aggregate failure")),
            Some(remaining) => {
                *remaining -= 1;
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn delay_for(&self, range: DateRange) -> Duration {
        if let Some((_, delay)) = self.window_delays.lock().iter().find(|(r, _)| *r == range) {
            return *delay;
        }
        match *self.slow_from.lock() {
            Some((at, delay)) if range.start() >= at => delay,
            _ => *self.fetch_delay.lock(),
        }
    }
}

/// Decrements the in-flight counter when a fetch ends or is dropped.
struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AggregateOracle for EventOracle {
    async fn aggregate(&self, range: DateRange) -> SyncResult<AggregateResult> {
        self.take_aggregate_budget()?;
        let events = self.in_range(range);
        let count = events.iter().map(|e| e.units).sum();

        let mut result = AggregateResult::count(count);
        if self.report_tightened.load(Ordering::SeqCst) {
            if let (Some(first), Some(last)) = (events.first(), events.last()) {
                if let Ok(tight) =
                    DateRange::new(first.start_date, last.end_date.min(range.end()))
                {
                    result = result.with_tightened(tight);
                }
            }
        }
        Ok(result)
    }

    async fn bucket_counts(
        &self,
        range: DateRange,
        interval: chrono::Duration,
    ) -> SyncResult<Vec<u64>> {
        self.take_aggregate_budget()?;
        Ok(range
            .buckets(interval)
            .into_iter()
            .map(|bucket| self.in_range(bucket).iter().map(|e| e.units).sum())
            .collect())
    }
}

#[async_trait]
impl RawFetchOracle for EventOracle {
    async fn fetch(&self, range: DateRange) -> SyncResult<Vec<RawEvent>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetched.lock().push(range);

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delay_for(range);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing_fetches.lock().contains(&range) {
            return Err(SyncError::source(format!("injected fetch failure for {range}")));
        }
        Ok(self.in_range(range).to_vec())
    }
}
