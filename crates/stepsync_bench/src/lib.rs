//! Benchmark utilities.

use chrono::{Duration, TimeZone, Utc};
use rand::Rng;
use stepsync_engine::{SyntheticConfig, SyntheticSource};
use stepsync_ledger::{DateRange, Ledger};

/// A history of `days` days starting 2023-01-01.
pub fn history(days: i64) -> DateRange {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    DateRange::new(start, start + Duration::days(days)).unwrap()
}

/// A synthetic source over `history(days)`.
pub fn source(days: i64) -> SyntheticSource {
    SyntheticSource::new(SyntheticConfig::new(42, history(days))).unwrap()
}

/// Inserts `count` consecutive hour-long chunks with random unit counts.
pub fn fill_ledger<L: Ledger>(ledger: &L, count: i64) {
    let mut rng = rand::thread_rng();
    let start = history(1).start();
    for i in 0..count {
        let range =
            DateRange::new(start + Duration::hours(i), start + Duration::hours(i + 1)).unwrap();
        ledger.insert(range, rng.gen_range(0..20_000)).unwrap();
    }
}

/// A current-thread runtime for driving async code from benchmarks.
pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}
