//! # stepsync Server
//!
//! Reference implementation of the remote sink: an append-only store of
//! step samples behind a small JSON HTTP API.
//!
//! | Method & path | Response |
//! |---|---|
//! | `GET /health` | `{"status":"ok"}` |
//! | `POST /steps` | `{"saved":n,"message":"Success"}` |
//! | `GET /steps` | `{"samples":[...],"total":n}` |
//! | `DELETE /steps` | `{"message":...}`, always 200 |
//!
//! Errors are `{"error": ...}` with 400 for malformed bodies and 500 for
//! server-side failures.
//!
//! ## Storage
//!
//! Samples are stored as newline-delimited JSON, one object per line, in
//! `<data_dir>/steps.jsonl`. Writes are serialized by a process-wide lock.
//! Malformed lines are skipped on read and never repaired.
//!
//! ## Example
//!
//! ```no_run
//! use stepsync_server::{ServerConfig, SinkServer};
//!
//! # async fn run() -> stepsync_server::ServerResult<()> {
//! let config = ServerConfig::default().with_data_dir("./data");
//! SinkServer::new(config)?.serve().await
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handler;
mod server;
mod store;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::RequestHandler;
pub use server::SinkServer;
pub use store::{SampleStore, STORE_FILE_NAME};
