//! # stepsync Ledger
//!
//! Persistent record of discovered chunks and their synced flags.
//!
//! A discovery run writes an ordered, gapless list of [`Chunk`]s; the sync
//! orchestrator later flips each chunk's `synced` flag once the remote sink
//! has acknowledged it. Progress is always derived from ledger contents, so a
//! process restart resumes exactly where the last completed flush left off.
//!
//! ## Design Principles
//!
//! - The ledger is the only shared mutable resource of a sync run
//! - Implementations must be `Send + Sync`; mutation goes through `&self`
//! - Mutations are visible to queries immediately, durable after [`Ledger::save`]
//!
//! ## Available Backends
//!
//! - [`InMemoryLedger`] - For testing and ephemeral runs
//! - [`FileLedger`] - JSON snapshot persisted with atomic replace
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use stepsync_ledger::{DateRange, InMemoryLedger, Ledger};
//!
//! let ledger = InMemoryLedger::new();
//! let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
//! let end = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
//! let chunk = ledger.insert(DateRange::new(start, end).unwrap(), 4_200).unwrap();
//!
//! ledger.mark_synced(chunk.id).unwrap();
//! assert!(ledger.progress().unwrap().is_complete());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod chunk;
mod error;
mod file;
mod ledger;
mod memory;
mod range;

pub use chunk::{Chunk, ChunkId, SyncProgress};
pub use error::{LedgerError, LedgerResult};
pub use file::FileLedger;
pub use ledger::Ledger;
pub use memory::InMemoryLedger;
pub use range::DateRange;
