//! Error types for the remote sink server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use stepsync_protocol::ErrorResponse;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the remote sink server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Malformed request body. The message is returned to the client verbatim.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding error while writing a record.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServerError::InvalidRequest(_))
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Returns the HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        if self.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }

    /// Returns the text sent in the `{"error": ...}` body.
    pub fn client_message(&self) -> String {
        match self {
            ServerError::InvalidRequest(message) => message.clone(),
            ServerError::Internal(message) => format!("Server error: {message}"),
            ServerError::Io(e) => format!("Server error: {e}"),
            ServerError::Json(e) => format!("Server error: {e}"),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        let body = ErrorResponse::new(self.client_message());
        (self.status_code(), Json(body)).into_response()
    }
}
