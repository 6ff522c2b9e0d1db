//! Property-based test generators using proptest.
//!
//! Provides strategies for generating event histories and partition
//! settings.

use chrono::Duration;
use proptest::prelude::*;
use stepsync_engine::RawEvent;
use uuid::Uuid;

use crate::fixtures::{day, FIXTURE_SOURCE};

/// Strategy for `(minute offset from day(0), units)` pairs inside `days` days.
pub fn event_spec_strategy(days: i64) -> impl Strategy<Value = (i64, u64)> {
    (0..days * 24 * 60, 1u64..2_000)
}

/// Strategy for event histories spread over `days` days starting at `day(0)`.
///
/// Event ids are derived from the position in the list, so shrinking keeps
/// them stable.
pub fn events_strategy(days: i64, max_events: usize) -> impl Strategy<Value = Vec<RawEvent>> {
    prop::collection::vec(event_spec_strategy(days), 0..max_events).prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(i, (minute, units))| {
                let start = day(0) + Duration::minutes(minute);
                RawEvent {
                    id: Uuid::from_u128(i as u128 + 1),
                    start_date: start,
                    end_date: start + Duration::minutes(3),
                    units,
                    source_id: FIXTURE_SOURCE.into(),
                    device_name: None,
                }
            })
            .collect()
    })
}

/// Strategy for chunk budgets.
pub fn budget_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![1u64..500, 500u64..20_000]
}

/// Strategy for bucket widths used by the partitioner.
pub fn bucket_interval_strategy() -> impl Strategy<Value = Duration> {
    prop_oneof![
        Just(Duration::minutes(15)),
        Just(Duration::hours(1)),
        Just(Duration::hours(6)),
        Just(Duration::days(1)),
    ]
}
