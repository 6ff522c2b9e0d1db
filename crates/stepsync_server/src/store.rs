//! Append-only JSONL sample store.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ServerResult;

/// Name of the sample file inside the data directory.
pub const STORE_FILE_NAME: &str = "steps.jsonl";

/// Newline-delimited JSON file holding one sample object per line.
///
/// All access goes through one lock, so concurrent appends never interleave
/// and reads never observe a half-written batch.
#[derive(Debug)]
pub struct SampleStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl SampleStore {
    /// Opens the store in `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(data_dir: impl AsRef<Path>) -> ServerResult<Self> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(STORE_FILE_NAME),
            lock: Mutex::new(()),
        })
    }

    /// Returns the path of the sample file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends records, one line each, and returns how many were written.
    pub fn append(&self, records: &[Map<String, Value>]) -> ServerResult<usize> {
        let mut buffer = Vec::new();
        for record in records {
            serde_json::to_writer(&mut buffer, record)?;
            buffer.push(b'\n');
        }

        let _guard = self.lock.lock();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&buffer)?;
        file.flush()?;
        Ok(records.len())
    }

    /// Reads every well-formed record. Blank and malformed lines are skipped.
    pub fn load(&self) -> ServerResult<Vec<Value>> {
        let _guard = self.lock.lock();
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (index, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Value>(trimmed) {
                Ok(record) => records.push(record),
                Err(e) => warn!(line = index + 1, error = %e, "skipping malformed line"),
            }
        }
        Ok(records)
    }

    /// Removes the sample file. Returns false if there was nothing to delete.
    pub fn delete_all(&self) -> ServerResult<bool> {
        let _guard = self.lock.lock();
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "sample file removed");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
