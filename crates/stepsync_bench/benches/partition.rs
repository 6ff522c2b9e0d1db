//! Partitioning benchmarks.

use chrono::Duration;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use stepsync_bench::{history, runtime, source};
use stepsync_engine::{AggregateOracle, PartitionConfig, Partitioner};

/// Partition a year of synthetic history at several budgets.
fn bench_budgets(c: &mut Criterion) {
    let rt = runtime();
    let source = source(365);
    let mut group = c.benchmark_group("partition_budget");

    for budget in [2_000u64, 10_000, 50_000] {
        let partitioner = Partitioner::new(PartitionConfig::new(budget));
        group.bench_with_input(BenchmarkId::from_parameter(budget), &budget, |b, _| {
            b.iter(|| {
                let partition = rt
                    .block_on(partitioner.partition(history(365), &source))
                    .unwrap();
                black_box(partition.chunks.len());
            });
        });
    }

    group.finish();
}

/// Partition with progressively finer bucket grids.
fn bench_bucket_interval(c: &mut Criterion) {
    let rt = runtime();
    let source = source(90);
    let mut group = c.benchmark_group("partition_bucket");

    for minutes in [5i64, 15, 60] {
        let config = PartitionConfig::new(10_000).with_bucket_interval(Duration::minutes(minutes));
        let partitioner = Partitioner::new(config);
        group.bench_with_input(BenchmarkId::from_parameter(minutes), &minutes, |b, _| {
            b.iter(|| {
                let partition = rt
                    .block_on(partitioner.partition(history(90), &source))
                    .unwrap();
                black_box(partition.oracle_queries);
            });
        });
    }

    group.finish();
}

/// Bucket counting alone, the dominant oracle query.
fn bench_bucket_counts(c: &mut Criterion) {
    let rt = runtime();
    let source = source(365);

    c.bench_function("bucket_counts_year_15m", |b| {
        b.iter(|| {
            let counts = rt
                .block_on(source.bucket_counts(history(365), Duration::minutes(15)))
                .unwrap();
            black_box(counts.len());
        });
    });
}

criterion_group!(
    benches,
    bench_budgets,
    bench_bucket_interval,
    bench_bucket_counts
);
criterion_main!(benches);
