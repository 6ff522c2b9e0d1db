//! Interval partitioning.
//!
//! Turns one long window into an ordered, gapless sequence of chunks whose
//! unit totals sit near a budget, using only the aggregate oracle.
//!
//! ## Algorithm
//!
//! 1. Aggregate the whole range. An empty history yields one zero-count
//!    chunk spanning the requested range.
//! 2. Boundary compaction: two binary searches narrow the range to the
//!    smallest window (at `min_granularity` resolution) holding all data.
//! 3. Fetch fixed-size bucket totals over the compacted range.
//! 4. Scan buckets newest to oldest, closing a chunk whenever the next
//!    bucket would overflow the budget. The cut lands on whichever side of
//!    that bucket leaves the total closer to the budget.
//! 5. Reverse into chronological order.
//!
//! A chunk may exceed the budget by at most one bucket's units. Strict
//! compliance is traded for a single bucket query per run.

use stepsync_ledger::DateRange;
use tracing::{debug, trace, warn};

use crate::config::PartitionConfig;
use crate::error::{SyncError, SyncResult};
use crate::source::{AggregateOracle, AggregateResult};

/// A window produced by the partitioner, ready to be inserted in a ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannedChunk {
    /// The chunk window.
    pub range: DateRange,
    /// Units observed at discovery time.
    pub unit_count: u64,
}

/// Output of one partition run.
#[derive(Debug, Clone)]
pub struct Partition {
    /// Chronological, contiguous chunks.
    pub chunks: Vec<PlannedChunk>,
    /// The range the chunks cover after boundary compaction.
    pub covered: DateRange,
    /// Units in the requested range.
    pub total_units: u64,
    /// Number of oracle trait calls issued.
    ///
    /// One [`AggregateOracle::bucket_counts`] call counts once, however the
    /// source answers it. With the default implementation the source sees
    /// one extra aggregate per bucket.
    pub oracle_queries: usize,
}

impl Partition {
    /// Returns the largest chunk total.
    pub fn max_unit_count(&self) -> u64 {
        self.chunks.iter().map(|c| c.unit_count).max().unwrap_or(0)
    }
}

/// Discovers chunk boundaries through an [`AggregateOracle`].
///
/// The partitioner is sequential: every oracle call is awaited before the
/// next decision is made.
#[derive(Debug, Clone, Default)]
pub struct Partitioner {
    config: PartitionConfig,
}

impl Partitioner {
    /// Creates a partitioner.
    pub fn new(config: PartitionConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &PartitionConfig {
        &self.config
    }

    /// Partitions `full` into budgeted chunks.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidArgument`] for an invalid configuration and
    /// [`SyncError::Discovery`] if any oracle call fails.
    pub async fn partition<A>(&self, full: DateRange, oracle: &A) -> SyncResult<Partition>
    where
        A: AggregateOracle + ?Sized,
    {
        self.config.validate()?;
        let mut run = Run {
            oracle,
            queries: 0,
        };

        let total = run.aggregate(full).await?;
        if total.count == 0 {
            debug!(range = %full, "empty history, single chunk");
            return Ok(Partition {
                chunks: vec![PlannedChunk {
                    range: full,
                    unit_count: 0,
                }],
                covered: full,
                total_units: 0,
                oracle_queries: run.queries,
            });
        }

        let covered = self.compact(full, total, &mut run).await?;
        if covered.duration() <= self.config.min_granularity {
            debug!(range = %covered, units = total.count, "range within granularity, single chunk");
            return Ok(Partition {
                chunks: vec![PlannedChunk {
                    range: covered,
                    unit_count: total.count,
                }],
                covered,
                total_units: total.count,
                oracle_queries: run.queries,
            });
        }

        let buckets = covered.buckets(self.config.bucket_interval);
        let counts = run
            .bucket_counts(covered, self.config.bucket_interval)
            .await?;
        if counts.len() != buckets.len() {
            return Err(SyncError::Discovery(format!(
                "oracle returned {} bucket counts for {} buckets",
                counts.len(),
                buckets.len()
            )));
        }

        let chunks = accumulate_backward(&buckets, &counts, self.config.budget);
        debug!(
            range = %covered,
            units = total.count,
            buckets = buckets.len(),
            chunks = chunks.len(),
            queries = run.queries,
            "partition complete"
        );

        Ok(Partition {
            chunks,
            covered,
            total_units: total.count,
            oracle_queries: run.queries,
        })
    }

    /// Narrows `full` to the smallest window holding all of its data.
    async fn compact<A>(
        &self,
        full: DateRange,
        total: AggregateResult,
        run: &mut Run<'_, A>,
    ) -> SyncResult<DateRange>
    where
        A: AggregateOracle + ?Sized,
    {
        let seed = total
            .tightened
            .and_then(|hint| hint.intersection(&full))
            .unwrap_or(full);
        let granularity = self.config.min_granularity;

        // Earliest data: keep the left half whenever it holds anything.
        let mut window = seed;
        while window.duration() > granularity {
            let Some((left, right)) = window.split_at(window.midpoint()) else {
                break;
            };
            window = if run.aggregate(left).await?.count > 0 {
                left
            } else {
                right
            };
        }
        let start = window.start();

        // Latest data: keep the right half whenever it holds anything.
        let mut window = seed;
        while window.duration() > granularity {
            let Some((left, right)) = window.split_at(window.midpoint()) else {
                break;
            };
            window = if run.aggregate(right).await?.count > 0 {
                right
            } else {
                left
            };
        }
        let end = window.end();

        match DateRange::new(start, end) {
            Ok(compacted) => {
                trace!(from = %full, to = %compacted, "boundaries compacted");
                Ok(compacted)
            }
            Err(_) => {
                warn!(range = %seed, "tightened bounds hold no data, compaction skipped");
                Ok(full)
            }
        }
    }
}

/// Counts oracle trait calls and maps their failures to discovery failures.
struct Run<'a, A: ?Sized> {
    oracle: &'a A,
    queries: usize,
}

impl<A: AggregateOracle + ?Sized> Run<'_, A> {
    async fn aggregate(&mut self, range: DateRange) -> SyncResult<AggregateResult> {
        self.queries += 1;
        let result = self
            .oracle
            .aggregate(range)
            .await
            .map_err(|e| SyncError::Discovery(e.to_string()))?;
        trace!(%range, count = result.count, "aggregate");
        Ok(result)
    }

    async fn bucket_counts(
        &mut self,
        range: DateRange,
        interval: chrono::Duration,
    ) -> SyncResult<Vec<u64>> {
        self.queries += 1;
        let counts = self
            .oracle
            .bucket_counts(range, interval)
            .await
            .map_err(|e| SyncError::Discovery(e.to_string()))?;
        trace!(%range, buckets = counts.len(), "bucket counts");
        Ok(counts)
    }
}

/// Groups consecutive buckets into chunks, scanning from the newest bucket.
///
/// `buckets` must be contiguous and chronological, with one count per
/// bucket. The output is chronological.
pub(crate) fn accumulate_backward(
    buckets: &[DateRange],
    counts: &[u64],
    budget: u64,
) -> Vec<PlannedChunk> {
    let mut chunks = Vec::new();
    // Open chunk is buckets[next..end].
    let mut end = buckets.len();
    let mut next = buckets.len();
    let mut sum = 0u64;

    let close = |from: usize, to: usize, units: u64, chunks: &mut Vec<PlannedChunk>| {
        if let (Some(first), Some(last)) = (buckets.get(from), buckets.get(to - 1)) {
            if let Ok(range) = DateRange::new(first.start(), last.end()) {
                chunks.push(PlannedChunk {
                    range,
                    unit_count: units,
                });
            }
        }
    };

    while next > 0 {
        let index = next - 1;
        let units = counts[index];
        let candidate = sum.saturating_add(units);

        if candidate > budget && next < end {
            let under = budget - sum;
            let over = candidate - budget;
            if over < under {
                close(index, end, candidate, &mut chunks);
                end = index;
                next = index;
            } else {
                close(next, end, sum, &mut chunks);
                end = next;
            }
            sum = 0;
            continue;
        }

        sum = candidate;
        next = index;
        if sum > budget {
            // A single bucket above the budget stands alone.
            close(next, end, sum, &mut chunks);
            end = next;
            sum = 0;
        }
    }

    if end > 0 {
        close(0, end, sum, &mut chunks);
    }

    chunks.reverse();
    chunks
}
