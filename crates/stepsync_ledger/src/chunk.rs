//! Chunk records and derived progress.

use crate::range::DateRange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Stable, unique identifier of a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(Uuid);

impl ChunkId {
    /// Generates a fresh random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The all-zero id.
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ChunkId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A discovered time window, the unit of discovery and sync.
///
/// `unit_count` is the total recorded at discovery time and is advisory only;
/// the transfer always re-reads raw events for the window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Chunk id.
    pub id: ChunkId,
    /// Inclusive window start.
    pub start_date: DateTime<Utc>,
    /// Exclusive window end.
    pub end_date: DateTime<Utc>,
    /// Units observed in the window at discovery time.
    pub unit_count: u64,
    /// Whether the remote sink has acknowledged this chunk.
    #[serde(default)]
    pub synced: bool,
}

impl Chunk {
    /// Creates an unsynced chunk for `range`.
    #[must_use]
    pub fn new(range: DateRange, unit_count: u64) -> Self {
        Self {
            id: ChunkId::new(),
            start_date: range.start(),
            end_date: range.end(),
            unit_count,
            synced: false,
        }
    }

    /// Returns the chunk window.
    ///
    /// Chunks deserialized from a hand-edited snapshot may carry an invalid
    /// window, hence the `Option`.
    #[must_use]
    pub fn range(&self) -> Option<DateRange> {
        DateRange::new(self.start_date, self.end_date).ok()
    }
}

/// Synced vs. total chunk counts, derived from ledger state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    /// Chunks with the synced flag set.
    pub synced_count: usize,
    /// All chunks in the ledger.
    pub total_count: usize,
}

impl SyncProgress {
    /// Creates a progress value.
    #[must_use]
    pub const fn new(synced_count: usize, total_count: usize) -> Self {
        Self {
            synced_count,
            total_count,
        }
    }

    /// Computes progress over a chunk list.
    #[must_use]
    pub fn from_chunks<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> Self {
        let mut progress = Self::default();
        for chunk in chunks {
            progress.total_count += 1;
            if chunk.synced {
                progress.synced_count += 1;
            }
        }
        progress
    }

    /// Chunks still waiting for transfer.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.total_count.saturating_sub(self.synced_count)
    }

    /// True when there is at least one chunk and all are synced.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.total_count > 0 && self.synced_count >= self.total_count
    }

    /// Synced fraction in `0.0..=1.0`; zero for an empty ledger.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total_count == 0 {
            0.0
        } else {
            self.synced_count as f64 / self.total_count as f64
        }
    }
}

impl fmt::Display for SyncProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.synced_count, self.total_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chunk(synced: bool) -> Chunk {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let mut chunk = Chunk::new(DateRange::new(start, end).unwrap(), 10);
        chunk.synced = synced;
        chunk
    }

    #[test]
    fn progress_from_chunks() {
        let chunks = vec![chunk(true), chunk(false), chunk(true)];
        let progress = SyncProgress::from_chunks(&chunks);
        assert_eq!(progress, SyncProgress::new(2, 3));
        assert_eq!(progress.remaining(), 1);
        assert!(!progress.is_complete());
        assert_eq!(progress.to_string(), "2/3");
    }

    #[test]
    fn empty_progress_is_not_complete() {
        let progress = SyncProgress::default();
        assert!(!progress.is_complete());
        assert_eq!(progress.fraction(), 0.0);
    }

    #[test]
    fn chunk_serializes_camel_case() {
        let json = serde_json::to_value(chunk(false)).unwrap();
        assert!(json.get("startDate").is_some());
        assert!(json.get("unitCount").is_some());
        assert_eq!(json["synced"], serde_json::Value::Bool(false));
    }

    #[test]
    fn chunk_ids_are_unique() {
        assert_ne!(chunk(false).id, chunk(false).id);
    }
}
