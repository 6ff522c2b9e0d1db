//! # stepsync Engine
//!
//! Discovers and transfers a long history of timestamped count events from a
//! source that only answers "total units in window" and "raw events in
//! window" to an append-only remote sink.
//!
//! This crate provides:
//! - Oracle traits for the two source query shapes
//! - The interval partitioner (boundary compaction + backward bucket accumulation)
//! - The sync orchestrator state machine (idle → discovering → ready → syncing ⇄ paused → completed)
//! - A bounded, replace-on-completion worker pool with cooperative cancellation
//! - A batched writer for synced flags
//! - Remote sink transports (HTTP and mock)
//! - A deterministic synthetic data source
//!
//! ## Architecture
//!
//! 1. Discovery reads the full range once through the aggregate oracle and
//!    replaces the ledger with an ordered, gapless chunk list
//! 2. Sync drains unsynced chunks through at most `M` concurrent workers;
//!    each worker fetches raw events, converts them and appends them to the sink
//! 3. A chunk is marked synced only after the sink acknowledged it
//!
//! ## Key Invariants
//!
//! - Discovery output is contiguous, non-overlapping and chronological
//! - At most `max_concurrent_chunks` chunk transfers are in flight
//! - Progress is derived from the ledger, never from in-memory counters
//! - Pausing never clears a synced flag; resuming never re-sends a synced chunk

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod http;
mod marks;
mod orchestrator;
mod partition;
mod source;
mod state;
mod synthetic;
mod transport;

pub use config::{
    HttpSinkConfig, MarkPolicy, PartitionConfig, SyncConfig, DEFAULT_BUDGET,
    DEFAULT_MAX_CONCURRENT_CHUNKS,
};
pub use error::{SyncError, SyncResult};
pub use http::HttpSink;
pub use marks::{MarkHandle, MarkWriter};
pub use orchestrator::SyncOrchestrator;
pub use partition::{Partition, Partitioner, PlannedChunk};
pub use source::{AggregateOracle, AggregateResult, RawEvent, RawFetchOracle};
pub use state::{SyncState, SyncStats};
pub use synthetic::{SyntheticConfig, SyntheticSource};
pub use transport::{MockSink, RemoteSink};

pub use stepsync_ledger::{Chunk, ChunkId, DateRange, Ledger, SyncProgress};
