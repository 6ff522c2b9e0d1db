//! Request and response bodies.

use crate::sample::Sample;
use serde::{Deserialize, Serialize};

/// Health status reported by a reachable sink.
pub const STATUS_OK: &str = "ok";

/// Message returned with a successful append.
pub const MSG_APPEND_OK: &str = "Success";

/// Message returned when stored samples were deleted.
pub const MSG_DELETED: &str = "All steps deleted successfully";

/// Message returned when there was nothing to delete.
pub const MSG_NOTHING_TO_DELETE: &str = "No steps file to delete";

/// `GET /health` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"ok"` when the sink is serving.
    pub status: String,
}

impl HealthResponse {
    /// Creates the healthy response.
    pub fn ok() -> Self {
        Self {
            status: STATUS_OK.into(),
        }
    }

    /// Returns true if the status is `"ok"`.
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// `POST /steps` request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendRequest {
    /// Samples to append, in any order.
    pub samples: Vec<Sample>,
}

impl AppendRequest {
    /// Creates an append request.
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

/// `POST /steps` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendResponse {
    /// Number of samples written.
    pub saved: usize,
    /// Human-readable outcome.
    pub message: String,
}

impl AppendResponse {
    /// Creates the success response for `saved` samples.
    pub fn success(saved: usize) -> Self {
        Self {
            saved,
            message: MSG_APPEND_OK.into(),
        }
    }
}

/// `GET /steps` response body.
///
/// The server stores whatever JSON objects it was sent, so it lists them as
/// raw values; clients normally decode into [`Sample`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListResponse<T = Sample> {
    /// Every stored sample.
    pub samples: Vec<T>,
    /// Number of samples.
    pub total: usize,
}

impl<T> ListResponse<T> {
    /// Wraps a full sample list.
    pub fn new(samples: Vec<T>) -> Self {
        let total = samples.len();
        Self { samples, total }
    }
}

/// `DELETE /steps` response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResponse {
    /// Human-readable outcome.
    pub message: String,
}

impl DeleteResponse {
    /// Creates a delete response; `existed` selects the message.
    pub fn new(existed: bool) -> Self {
        let message = if existed {
            MSG_DELETED
        } else {
            MSG_NOTHING_TO_DELETE
        };
        Self {
            message: message.into(),
        }
    }
}

/// Error body sent with 4xx/5xx responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error description.
    pub error: String,
}

impl ErrorResponse {
    /// Creates an error body.
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn append_response_shape() {
        let json = serde_json::to_value(AppendResponse::success(3)).unwrap();
        assert_eq!(json, json!({"saved": 3, "message": "Success"}));
    }

    #[test]
    fn list_response_counts_samples() {
        let list = ListResponse::new(vec![json!({"a": 1}), json!({"b": 2})]);
        assert_eq!(list.total, 2);
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["total"], 2);
    }

    #[test]
    fn delete_messages() {
        assert_eq!(DeleteResponse::new(true).message, MSG_DELETED);
        assert_eq!(DeleteResponse::new(false).message, MSG_NOTHING_TO_DELETE);
    }

    #[test]
    fn health_parses() {
        let health: HealthResponse = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert!(health.is_ok());
    }

    #[test]
    fn append_request_rejects_missing_samples() {
        assert!(serde_json::from_str::<AppendRequest>("{}").is_err());
    }
}
