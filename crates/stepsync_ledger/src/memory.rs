//! In-memory ledger for testing.

use crate::chunk::{Chunk, ChunkId, SyncProgress};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::range::DateRange;
use parking_lot::RwLock;

/// An in-memory ledger.
///
/// This ledger keeps all chunks in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - One-shot runs that don't need to resume
///
/// # Example
///
/// ```rust
/// use stepsync_ledger::{InMemoryLedger, Ledger};
///
/// let ledger = InMemoryLedger::new();
/// assert!(ledger.query_unsynced().unwrap().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    chunks: RwLock<Vec<Chunk>>,
}

impl InMemoryLedger {
    /// Creates a new empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a ledger with pre-existing chunks.
    ///
    /// Useful for testing resume scenarios.
    #[must_use]
    pub fn with_chunks(mut chunks: Vec<Chunk>) -> Self {
        chunks.sort_by_key(|c| c.start_date);
        Self {
            chunks: RwLock::new(chunks),
        }
    }

    /// Returns the number of chunks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    /// Returns true if the ledger holds no chunks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }
}

/// Inserts keeping the list ordered by start date.
pub(crate) fn insert_ordered(chunks: &mut Vec<Chunk>, chunk: Chunk) {
    let at = chunks.partition_point(|c| c.start_date <= chunk.start_date);
    chunks.insert(at, chunk);
}

/// Flips the synced flag of `id`.
pub(crate) fn mark_in(chunks: &mut [Chunk], id: ChunkId) -> LedgerResult<bool> {
    let chunk = chunks
        .iter_mut()
        .find(|c| c.id == id)
        .ok_or(LedgerError::ChunkNotFound(id))?;
    let changed = !chunk.synced;
    chunk.synced = true;
    Ok(changed)
}

/// Flips the synced flag of every known id in `ids`.
///
/// Unknown ids do not stop the batch. Returns whether any flag changed and
/// the first error seen.
pub(crate) fn mark_all_in(chunks: &mut [Chunk], ids: &[ChunkId]) -> (bool, LedgerResult<()>) {
    let mut changed = false;
    let mut result = Ok(());
    for id in ids {
        match mark_in(chunks, *id) {
            Ok(flipped) => changed |= flipped,
            Err(e) => {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
    }
    (changed, result)
}

impl Ledger for InMemoryLedger {
    fn insert(&self, range: DateRange, unit_count: u64) -> LedgerResult<Chunk> {
        let chunk = Chunk::new(range, unit_count);
        insert_ordered(&mut self.chunks.write(), chunk.clone());
        Ok(chunk)
    }

    fn delete_all(&self) -> LedgerResult<()> {
        self.chunks.write().clear();
        Ok(())
    }

    fn mark_synced(&self, id: ChunkId) -> LedgerResult<()> {
        mark_in(&mut self.chunks.write(), id).map(|_| ())
    }

    fn mark_synced_batch(&self, ids: &[ChunkId]) -> LedgerResult<()> {
        mark_all_in(&mut self.chunks.write(), ids).1
    }

    fn query_unsynced(&self) -> LedgerResult<Vec<Chunk>> {
        Ok(self
            .chunks
            .read()
            .iter()
            .filter(|c| !c.synced)
            .cloned()
            .collect())
    }

    fn chunks(&self) -> LedgerResult<Vec<Chunk>> {
        Ok(self.chunks.read().clone())
    }

    fn progress(&self) -> LedgerResult<SyncProgress> {
        Ok(SyncProgress::from_chunks(self.chunks.read().iter()))
    }

    fn save(&self) -> LedgerResult<()> {
        Ok(())
    }
}
