//! Request handling, independent of the HTTP framework.

use std::sync::Arc;

use serde_json::Value;
use stepsync_protocol::{AppendResponse, DeleteResponse, HealthResponse, ListResponse};
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::store::SampleStore;

const EXPECTED_BODY: &str = r#"Invalid request body. Expected {"samples": [...]}"#;

/// Handles remote sink requests against a [`SampleStore`].
#[derive(Debug, Clone)]
pub struct RequestHandler {
    store: Arc<SampleStore>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(store: Arc<SampleStore>) -> Self {
        Self { store }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &SampleStore {
        &self.store
    }

    /// Handles a health check.
    pub fn health(&self) -> HealthResponse {
        HealthResponse::ok()
    }

    /// Handles an append request body.
    ///
    /// Every sample is validated before anything is written, so a rejected
    /// request never leaves a partial batch behind.
    pub fn append(&self, body: &[u8]) -> ServerResult<AppendResponse> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|_| ServerError::InvalidRequest("Invalid JSON".into()))?;

        let samples = value
            .as_object()
            .and_then(|object| object.get("samples"))
            .ok_or_else(|| ServerError::InvalidRequest(EXPECTED_BODY.into()))?;
        let samples = samples
            .as_array()
            .ok_or_else(|| ServerError::InvalidRequest("samples must be a list".into()))?;

        let records = samples
            .iter()
            .map(|sample| {
                sample.as_object().cloned().ok_or_else(|| {
                    ServerError::InvalidRequest("Each sample must be a JSON object".into())
                })
            })
            .collect::<ServerResult<Vec<_>>>()?;

        let saved = self.store.append(&records)?;
        info!(saved, "samples appended");
        Ok(AppendResponse::success(saved))
    }

    /// Handles a list request.
    pub fn list(&self) -> ServerResult<ListResponse<Value>> {
        Ok(ListResponse::new(self.store.load()?))
    }

    /// Handles a delete-all request.
    pub fn delete_all(&self) -> ServerResult<DeleteResponse> {
        let existed = self.store.delete_all()?;
        info!(existed, "samples deleted");
        Ok(DeleteResponse::new(existed))
    }
}
