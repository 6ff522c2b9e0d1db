//! # stepsync Testkit
//!
//! Test utilities for stepsync.
//!
//! This crate provides:
//! - An instrumented in-memory source implementing both oracles, with
//!   injectable latency and failures
//! - Event and ledger fixtures
//! - Property-based test generators using proptest
//! - Invariant assertions for partitions and sink contents
//! - An in-process remote sink server bound to an ephemeral port
//!
//! ## Usage
//!
//! ```rust,ignore
//! use stepsync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn partitions_daily_history() {
//!     let oracle = EventOracle::new(daily_events(day(0), 10, 5_000));
//!     // ... run the partitioner against the oracle
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod assertions;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod oracle;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assertions::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
    pub use crate::oracle::*;
}

pub use assertions::*;
pub use fixtures::*;
pub use generators::*;
pub use integration::*;
pub use oracle::*;
