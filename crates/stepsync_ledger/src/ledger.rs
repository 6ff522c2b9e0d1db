//! Ledger trait definition.

use crate::chunk::{Chunk, ChunkId, SyncProgress};
use crate::error::LedgerResult;
use crate::range::DateRange;

/// Persistent store of chunks and their synced flags.
///
/// # Invariants
///
/// - `query_unsynced` and `chunks` return chunks ordered by `start_date`
/// - A synced flag, once set, is only cleared by `delete_all`
/// - Concurrent `mark_synced` calls never lose updates
/// - Mutations are visible to queries immediately; `save` makes them durable
///
/// # Implementors
///
/// - [`super::InMemoryLedger`] - For testing
/// - [`super::FileLedger`] - For persistent storage
pub trait Ledger: Send + Sync {
    /// Records a new, unsynced chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk cannot be recorded.
    fn insert(&self, range: DateRange, unit_count: u64) -> LedgerResult<Chunk>;

    /// Removes every chunk.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the mutation.
    fn delete_all(&self) -> LedgerResult<()>;

    /// Sets the synced flag of one chunk.
    ///
    /// Marking an already synced chunk is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`crate::LedgerError::ChunkNotFound`] for unknown ids.
    fn mark_synced(&self, id: ChunkId) -> LedgerResult<()>;

    /// Sets the synced flag of several chunks.
    ///
    /// # Errors
    ///
    /// Every known id is marked even if some ids fail; the first error is
    /// returned and the applied marks are persisted by the next `save`.
    fn mark_synced_batch(&self, ids: &[ChunkId]) -> LedgerResult<()> {
        let mut result = Ok(());
        for id in ids {
            if let Err(e) = self.mark_synced(*id) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }

    /// Returns the chunks whose synced flag is not set, ordered by start.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn query_unsynced(&self) -> LedgerResult<Vec<Chunk>>;

    /// Returns every chunk, ordered by start.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn chunks(&self) -> LedgerResult<Vec<Chunk>>;

    /// Returns synced vs. total counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn progress(&self) -> LedgerResult<SyncProgress> {
        Ok(SyncProgress::from_chunks(&self.chunks()?))
    }

    /// Commits pending writes to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the commit fails; in-memory state is kept.
    fn save(&self) -> LedgerResult<()>;
}

impl<L: Ledger + ?Sized> Ledger for std::sync::Arc<L> {
    fn insert(&self, range: DateRange, unit_count: u64) -> LedgerResult<Chunk> {
        (**self).insert(range, unit_count)
    }

    fn delete_all(&self) -> LedgerResult<()> {
        (**self).delete_all()
    }

    fn mark_synced(&self, id: ChunkId) -> LedgerResult<()> {
        (**self).mark_synced(id)
    }

    fn mark_synced_batch(&self, ids: &[ChunkId]) -> LedgerResult<()> {
        (**self).mark_synced_batch(ids)
    }

    fn query_unsynced(&self) -> LedgerResult<Vec<Chunk>> {
        (**self).query_unsynced()
    }

    fn chunks(&self) -> LedgerResult<Vec<Chunk>> {
        (**self).chunks()
    }

    fn progress(&self) -> LedgerResult<SyncProgress> {
        (**self).progress()
    }

    fn save(&self) -> LedgerResult<()> {
        (**self).save()
    }
}
