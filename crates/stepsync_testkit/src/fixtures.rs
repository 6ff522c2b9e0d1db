//! Event, ledger and sample fixtures.

use chrono::{DateTime, Duration, TimeZone, Utc};
use stepsync_engine::RawEvent;
use stepsync_ledger::{Chunk, DateRange, Ledger};
use stepsync_protocol::Sample;
use uuid::Uuid;

/// Source identifier used by fixture events.
pub const FIXTURE_SOURCE: &str = "com.stepsync.fixture";

/// Midnight UTC on 2024-01-01, the origin of fixture timelines.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .expect("valid fixture epoch")
}

/// Midnight of day `n` after [`epoch`].
pub fn day(n: i64) -> DateTime<Utc> {
    epoch() + Duration::days(n)
}

/// The window `[day(from), day(to))`.
pub fn days(from: i64, to: i64) -> DateRange {
    DateRange::new(day(from), day(to)).expect("fixture range must not be empty")
}

/// A five-minute event starting at `start`.
pub fn event_at(start: DateTime<Utc>, units: u64) -> RawEvent {
    RawEvent {
        id: Uuid::new_v4(),
        start_date: start,
        end_date: start + Duration::minutes(5),
        units,
        source_id: FIXTURE_SOURCE.into(),
        device_name: None,
    }
}

/// One event per day at noon, `count` days starting at `start`.
pub fn daily_events(start: DateTime<Utc>, count: i64, units_per_day: u64) -> Vec<RawEvent> {
    (0..count)
        .map(|d| event_at(start + Duration::days(d) + Duration::hours(12), units_per_day))
        .collect()
}

/// One event per hour at half past, covering `range`.
pub fn hourly_events(range: DateRange, units: u64) -> Vec<RawEvent> {
    let hours = range.duration().num_hours();
    (0..hours)
        .map(|h| range.start() + Duration::hours(h) + Duration::minutes(30))
        .filter(|start| range.contains(*start))
        .map(|start| event_at(start, units))
        .collect()
}

/// Inserts `count` consecutive one-day chunks starting at `day(first)`.
pub fn day_chunks<L: Ledger + ?Sized>(ledger: &L, first: i64, count: i64) -> Vec<Chunk> {
    let chunks = (first..first + count)
        .map(|d| {
            ledger
                .insert(days(d, d + 1), 0)
                .expect("fixture chunk insert")
        })
        .collect();
    ledger.save().expect("fixture ledger save");
    chunks
}

/// A wire sample with a recognizable uuid.
pub fn sample(n: u64) -> Sample {
    Sample {
        uuid: format!("00000000-0000-0000-0000-{n:012}"),
        ..event_at(day(0) + Duration::minutes(n as i64), n).to_sample()
    }
}
