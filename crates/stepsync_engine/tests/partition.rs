//! Partitioner behaviour against the instrumented oracle.

use std::future::Future;
use std::sync::Arc;

use chrono::Duration;
use proptest::prelude::*;
use stepsync_engine::{
    AggregateOracle, Ledger, PartitionConfig, Partitioner, SyncConfig, SyncError, SyncState,
};
use stepsync_testkit::prelude::*;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn daily(budget: u64) -> Partitioner {
    Partitioner::new(PartitionConfig::new(budget).with_bucket_interval(Duration::days(1)))
}

#[tokio::test]
async fn uniform_days_pair_into_budgeted_chunks() {
    let oracle = EventOracle::new(daily_events(day(0), 10, 5_000));

    let partition = daily(10_000).partition(days(0, 10), &oracle).await.unwrap();

    assert_eq!(partition.chunks.len(), 5);
    for (i, chunk) in partition.chunks.iter().enumerate() {
        let first = 2 * i as i64;
        assert_eq!(chunk.range, days(first, first + 2));
        assert_eq!(chunk.unit_count, 10_000);
    }
    assert_partition_tiles(&partition);
}

#[tokio::test]
async fn empty_year_is_one_zero_chunk() {
    let oracle = EventOracle::empty();
    let year = days(0, 366);

    let partition = daily(10_000).partition(year, &oracle).await.unwrap();

    assert_eq!(partition.chunks.len(), 1);
    assert_eq!(partition.chunks[0].range, year);
    assert_eq!(partition.chunks[0].unit_count, 0);
    assert_eq!(partition.oracle_queries, 1);
}

#[tokio::test]
async fn query_count_matches_source_calls() {
    let oracle = EventOracle::new(hourly_events(days(0, 30), 40));

    let partition = daily(5_000).partition(days(0, 30), &oracle).await.unwrap();

    assert!(partition.chunks.len() > 1);
    assert_eq!(partition.oracle_queries, oracle.aggregate_calls());
}

#[tokio::test]
async fn compaction_skips_empty_history() {
    let oracle = EventOracle::new(daily_events(day(200), 10, 5_000));
    let first = oracle.events().first().unwrap().start_date;
    let last = oracle.events().last().unwrap().start_date;

    let partition = Partitioner::new(PartitionConfig::new(10_000))
        .partition(days(0, 366), &oracle)
        .await
        .unwrap();

    let covered = partition.covered;
    assert!(covered.start() <= first && first - covered.start() < Duration::days(1));
    assert!(covered.end() > last && covered.end() - last <= Duration::days(1));
    assert_partition_tiles(&partition);
    assert_eq!(partition.total_units, 50_000);
    assert_eq!(
        partition.chunks.iter().map(|c| c.unit_count).sum::<u64>(),
        50_000
    );
}

#[tokio::test]
async fn tightened_bounds_seed_compaction() {
    let events = daily_events(day(200), 10, 5_000);
    let plain = EventOracle::new(events.clone());
    let tight = EventOracle::new(events).with_tightened_bounds();
    let partitioner = Partitioner::new(PartitionConfig::new(10_000));

    let without = partitioner.partition(days(0, 366), &plain).await.unwrap();
    let with = partitioner.partition(days(0, 366), &tight).await.unwrap();

    assert!(with.oracle_queries < without.oracle_queries);
    assert_eq!(with.total_units, without.total_units);
    assert_partition_tiles(&with);
}

#[tokio::test]
async fn narrow_range_is_a_single_chunk() {
    let oracle = EventOracle::new(hourly_events(days(0, 1), 5_000));

    let partition = Partitioner::new(PartitionConfig::new(100))
        .partition(days(0, 1), &oracle)
        .await
        .unwrap();

    assert_eq!(partition.chunks.len(), 1);
    assert_eq!(partition.chunks[0].unit_count, 24 * 5_000);
}

#[tokio::test]
async fn invalid_budget_is_rejected() {
    let oracle = EventOracle::empty();
    let err = Partitioner::new(PartitionConfig::new(0))
        .partition(days(0, 1), &oracle)
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::InvalidArgument(_)));
    assert_eq!(oracle.aggregate_calls(), 0);
}

#[tokio::test]
async fn oracle_failure_is_a_discovery_failure() {
    let oracle = EventOracle::new(daily_events(day(0), 30, 5_000));
    oracle.fail_aggregates_after(3);

    let err = daily(10_000)
        .partition(days(0, 30), &oracle)
        .await
        .unwrap_err();
    assert!(err.is_discovery_failure());
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn failed_discovery_leaves_ledger_empty() {
    let oracle = Arc::new(EventOracle::new(daily_events(day(0), 30, 5_000)));
    let orchestrator = mock_orchestrator(&oracle, SyncConfig::new());
    orchestrator.discover(days(0, 30)).await.unwrap();
    assert!(orchestrator.progress().unwrap().total_count > 0);

    oracle.fail_aggregates_after(2);
    let err = orchestrator.discover(days(0, 30)).await.unwrap_err();

    assert!(err.is_discovery_failure());
    assert_eq!(orchestrator.progress().unwrap().total_count, 0);
    assert!(matches!(
        orchestrator.state(),
        SyncState::Failed {
            retryable: false,
            ..
        }
    ));
    assert!(orchestrator.sync().await.is_err());

    oracle.clear_aggregate_failures();
    orchestrator.discover(days(0, 30)).await.unwrap();
    assert!(matches!(orchestrator.state(), SyncState::ReadyToSync { .. }));
}

#[tokio::test]
async fn discovery_replaces_previous_chunks() {
    let oracle = Arc::new(EventOracle::new(daily_events(day(0), 10, 5_000)));
    let config = SyncConfig::new().with_partition(
        PartitionConfig::new(10_000).with_bucket_interval(Duration::days(1)),
    );
    let orchestrator = mock_orchestrator(&oracle, config);

    orchestrator.discover(days(0, 10)).await.unwrap();
    orchestrator.discover(days(0, 10)).await.unwrap();

    let chunks = orchestrator.ledger().chunks().unwrap();
    assert_eq!(chunks.len(), 5);
    assert_chunks_tile(&chunks, days(0, 10));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn partition_tiles_and_bounds_overshoot(
        events in events_strategy(30, 120),
        budget in budget_strategy(),
        interval in bucket_interval_strategy(),
    ) {
        let oracle = EventOracle::new(events);
        let full = days(0, 30);
        let partitioner = Partitioner::new(
            PartitionConfig::new(budget).with_bucket_interval(interval),
        );

        let (partition, max_bucket) = block_on(async {
            let partition = partitioner.partition(full, &oracle).await.unwrap();
            let max_bucket = oracle
                .bucket_counts(partition.covered, interval)
                .await
                .unwrap()
                .into_iter()
                .max()
                .unwrap_or(0);
            (partition, max_bucket)
        });

        assert_partition_tiles(&partition);
        prop_assert!(partition.covered.start() >= full.start());
        prop_assert!(partition.covered.end() <= full.end());
        prop_assert_eq!(
            partition.chunks.iter().map(|c| c.unit_count).sum::<u64>(),
            oracle.total_units()
        );
        for event in oracle.events() {
            prop_assert!(partition.covered.contains(event.start_date));
        }
        if partition.chunks.len() > 1 {
            assert_overshoot_bounded(&partition, budget, max_bucket);
        }
    }

    #[test]
    fn empty_history_spans_the_request(from in 0i64..100, len in 1i64..400) {
        let oracle = EventOracle::empty();
        let full = days(from, from + len);
        let partition = block_on(daily(10_000).partition(full, &oracle)).unwrap();

        prop_assert_eq!(partition.chunks.len(), 1);
        prop_assert_eq!(partition.chunks[0].range, full);
        prop_assert_eq!(partition.chunks[0].unit_count, 0);
    }
}
