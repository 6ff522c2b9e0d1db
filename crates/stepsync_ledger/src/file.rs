//! File-backed ledger with atomic snapshot replacement.

use crate::chunk::{Chunk, ChunkId, SyncProgress};
use crate::error::{LedgerError, LedgerResult};
use crate::ledger::Ledger;
use crate::memory::{insert_ordered, mark_all_in, mark_in};
use crate::range::DateRange;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Snapshot format version written by this build.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    chunks: Vec<Chunk>,
}

/// A file-backed ledger.
///
/// All chunks live in memory; [`Ledger::save`] writes a JSON snapshot of the
/// whole ledger to a sibling temp file, syncs it and renames it over the
/// target, so a crash leaves either the previous or the new snapshot.
///
/// # Durability
///
/// - Mutations are visible to queries immediately
/// - Mutations survive process termination only after `save()` returns
/// - `save()` with no pending mutations does not touch the disk
///
/// # Example
///
/// ```no_run
/// use stepsync_ledger::{FileLedger, Ledger};
/// use std::path::Path;
///
/// let ledger = FileLedger::open(Path::new("ledger.json")).unwrap();
/// let progress = ledger.progress().unwrap();
/// println!("{progress} chunks synced");
/// ```
#[derive(Debug)]
pub struct FileLedger {
    path: PathBuf,
    chunks: RwLock<Vec<Chunk>>,
    dirty: AtomicBool,
    save_lock: Mutex<()>,
}

impl FileLedger {
    /// Opens the ledger at `path`, starting empty if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    pub fn open(path: &Path) -> LedgerResult<Self> {
        let chunks = if path.exists() {
            let bytes = fs::read(path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            if snapshot.version != FORMAT_VERSION {
                return Err(LedgerError::UnsupportedVersion {
                    found: snapshot.version,
                    expected: FORMAT_VERSION,
                });
            }
            let mut chunks = snapshot.chunks;
            chunks.sort_by_key(|c| c.start_date);
            chunks
        } else {
            Vec::new()
        };

        tracing::debug!(path = %path.display(), chunks = chunks.len(), "opened ledger");

        Ok(Self {
            path: path.to_path_buf(),
            chunks: RwLock::new(chunks),
            dirty: AtomicBool::new(false),
            save_lock: Mutex::new(()),
        })
    }

    /// Opens the ledger, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> LedgerResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns true if there are mutations not yet saved.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> LedgerResult<()> {
        let bytes = serde_json::to_vec(snapshot)?;
        let temp = self.temp_path();
        {
            let mut file = File::create(&temp)?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }
}

impl Ledger for FileLedger {
    fn insert(&self, range: DateRange, unit_count: u64) -> LedgerResult<Chunk> {
        let chunk = Chunk::new(range, unit_count);
        insert_ordered(&mut self.chunks.write(), chunk.clone());
        self.dirty.store(true, Ordering::SeqCst);
        Ok(chunk)
    }

    fn delete_all(&self) -> LedgerResult<()> {
        self.chunks.write().clear();
        self.dirty.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn mark_synced(&self, id: ChunkId) -> LedgerResult<()> {
        if mark_in(&mut self.chunks.write(), id)? {
            self.dirty.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    fn mark_synced_batch(&self, ids: &[ChunkId]) -> LedgerResult<()> {
        let (changed, result) = mark_all_in(&mut self.chunks.write(), ids);
        if changed {
            self.dirty.store(true, Ordering::SeqCst);
        }
        result
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
        let _guard = self.save_lock.lock();
        if !self.dirty.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let snapshot = Snapshot {
            version: FORMAT_VERSION,
            chunks: self.chunks.read().clone(),
        };

        if let Err(e) = self.write_snapshot(&snapshot) {
            self.dirty.store(true, Ordering::SeqCst);
            tracing::warn!(path = %self.path.display(), error = %e, "ledger save failed");
            return Err(e);
        }

        tracing::trace!(path = %self.path.display(), chunks = snapshot.chunks.len(), "ledger saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn day_range(d: u32) -> DateRange {
        let start = Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 1, d + 1, 0, 0, 0).unwrap();
        DateRange::new(start, end).unwrap()
    }

    #[test]
    fn open_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let ledger = FileLedger::open(&dir.path().join("ledger.json")).unwrap();
        assert!(ledger.chunks().unwrap().is_empty());
        assert!(!ledger.has_unsaved_changes());
    }

    #[test]
    fn saved_state_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let synced_id = {
            let ledger = FileLedger::open(&path).unwrap();
            let a = ledger.insert(day_range(1), 100).unwrap();
            ledger.insert(day_range(2), 200).unwrap();
            ledger.mark_synced(a.id).unwrap();
            ledger.save().unwrap();
            a.id
        };

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.progress().unwrap(), SyncProgress::new(1, 2));
        let unsynced = ledger.query_unsynced().unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_ne!(unsynced[0].id, synced_id);
        assert_eq!(unsynced[0].unit_count, 200);
    }

    #[test]
    fn partial_batch_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        {
            let ledger = FileLedger::open(&path).unwrap();
            let a = ledger.insert(day_range(1), 100).unwrap();
            let b = ledger.insert(day_range(2), 100).unwrap();
            ledger.save().unwrap();

            let result = ledger.mark_synced_batch(&[a.id, ChunkId::new(), b.id]);
            assert!(matches!(result, Err(LedgerError::ChunkNotFound(_))));
            assert!(ledger.has_unsaved_changes());
            ledger.save().unwrap();
        }

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.progress().unwrap(), SyncProgress::new(2, 2));
    }

    #[test]
    fn unsaved_changes_are_lost_on_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        {
            let ledger = FileLedger::open(&path).unwrap();
            let a = ledger.insert(day_range(1), 1).unwrap();
            ledger.save().unwrap();
            ledger.mark_synced(a.id).unwrap();
            assert!(ledger.has_unsaved_changes());
        }

        let ledger = FileLedger::open(&path).unwrap();
        assert_eq!(ledger.progress().unwrap(), SyncProgress::new(0, 1));
    }

    #[test]
    fn save_clears_dirty_flag_and_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        let ledger = FileLedger::open(&path).unwrap();
        ledger.insert(day_range(1), 1).unwrap();
        ledger.save().unwrap();

        assert!(!ledger.has_unsaved_changes());
        assert!(path.exists());
        assert!(!dir.path().join("ledger.json.tmp").exists());
    }

    #[test]
    fn rejects_unknown_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, br#"{"version":99,"chunks":[]}"#).unwrap();

        let result = FileLedger::open(&path);
        assert!(matches!(
            result,
            Err(LedgerError::UnsupportedVersion { found: 99, .. })
        ));
    }

    #[test]
    fn rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        fs::write(&path, b"not json").unwrap();
        assert!(matches!(FileLedger::open(&path), Err(LedgerError::Codec(_))));
    }

    #[test]
    fn create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.json");
        let ledger = FileLedger::open_with_create_dirs(&path).unwrap();
        ledger.insert(day_range(1), 1).unwrap();
        ledger.save().unwrap();
        assert!(path.exists());
        assert_eq!(ledger.path(), path);
    }
}
