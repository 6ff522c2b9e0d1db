//! Invariant assertions shared by integration tests.

use std::collections::HashSet;

use stepsync_engine::Partition;
use stepsync_ledger::{Chunk, DateRange};
use stepsync_protocol::Sample;

/// Asserts that `ranges` are chronological, gapless, non-overlapping and
/// cover exactly `covered`.
pub fn assert_tiles(ranges: &[DateRange], covered: DateRange) {
    let (Some(first), Some(last)) = (ranges.first(), ranges.last()) else {
        panic!("expected at least one range covering {covered}");
    };
    assert_eq!(first.start(), covered.start(), "first range must start at {covered}");
    assert_eq!(last.end(), covered.end(), "last range must end at {covered}");
    for pair in ranges.windows(2) {
        assert_eq!(
            pair[0].end(),
            pair[1].start(),
            "gap or overlap between {} and {}",
            pair[0],
            pair[1]
        );
    }
}

/// Asserts that a partition tiles its covered range.
pub fn assert_partition_tiles(partition: &Partition) {
    let ranges: Vec<DateRange> = partition.chunks.iter().map(|c| c.range).collect();
    assert_tiles(&ranges, partition.covered);
}

/// Asserts that ledger chunks tile `covered`.
pub fn assert_chunks_tile(chunks: &[Chunk], covered: DateRange) {
    let ranges: Vec<DateRange> = chunks
        .iter()
        .map(|c| c.range().expect("persisted chunk must have a valid window"))
        .collect();
    assert_tiles(&ranges, covered);
}

/// Asserts that no chunk exceeds `budget` by more than `max_bucket` units.
pub fn assert_overshoot_bounded(partition: &Partition, budget: u64, max_bucket: u64) {
    for chunk in &partition.chunks {
        assert!(
            chunk.unit_count <= budget.saturating_add(max_bucket),
            "chunk {} holds {} units, budget {} + bucket {}",
            chunk.range,
            chunk.unit_count,
            budget,
            max_bucket
        );
    }
}

/// Asserts that no sample uuid was delivered twice.
pub fn assert_unique_samples(samples: &[Sample]) {
    let mut seen = HashSet::with_capacity(samples.len());
    for sample in samples {
        assert!(seen.insert(&sample.uuid), "sample {} delivered twice", sample.uuid);
    }
}
