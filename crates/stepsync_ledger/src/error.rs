//! Error types for ledger operations.

use crate::chunk::ChunkId;
use std::io;
use thiserror::Error;

/// Result type for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The persisted snapshot could not be encoded or decoded.
    #[error("snapshot codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// A chunk range was empty or inverted.
    #[error("invalid range: start {start} is not before end {end}")]
    InvalidRange {
        /// Requested start (RFC 3339).
        start: String,
        /// Requested end (RFC 3339).
        end: String,
    },

    /// No chunk with the given id exists.
    #[error("chunk not found: {0}")]
    ChunkNotFound(ChunkId),

    /// The snapshot was written by an unsupported format version.
    #[error("unsupported ledger format version {found}, expected {expected}")]
    UnsupportedVersion {
        /// Version found on disk.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },
}
