//! # stepsync Protocol
//!
//! Wire types of the remote sink, the append-only HTTP store that receives
//! transferred samples.
//!
//! | Operation | Method & Path | Request | Success |
//! |---|---|---|---|
//! | Health check | `GET /health` | - | [`HealthResponse`] |
//! | Append samples | `POST /steps` | [`AppendRequest`] | [`AppendResponse`] |
//! | List samples | `GET /steps` | - | [`ListResponse`] |
//! | Delete all | `DELETE /steps` | - | [`DeleteResponse`] |
//!
//! Failures carry an [`ErrorResponse`] body with status 400 or 500.
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod messages;
mod sample;

pub use messages::{
    AppendRequest, AppendResponse, DeleteResponse, ErrorResponse, HealthResponse, ListResponse,
    MSG_APPEND_OK, MSG_DELETED, MSG_NOTHING_TO_DELETE, STATUS_OK,
};
pub use sample::Sample;

/// Path of the health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Path of the sample collection endpoint.
pub const STEPS_PATH: &str = "/steps";
