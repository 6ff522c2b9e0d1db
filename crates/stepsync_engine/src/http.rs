//! HTTP remote sink.
//!
//! Talks JSON to the remote sink over `reqwest`. Every request carries the
//! configured timeout; the health probe uses its own, shorter one because it
//! gates reachability decisions.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use stepsync_protocol::{
    AppendRequest, AppendResponse, DeleteResponse, ErrorResponse, HealthResponse, ListResponse,
    Sample, HEALTH_PATH, STEPS_PATH,
};
use tracing::{debug, warn};

use crate::config::HttpSinkConfig;
use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteSink;

/// Remote sink reached over HTTP.
pub struct HttpSink {
    config: HttpSinkConfig,
    client: reqwest::Client,
    last_error: RwLock<Option<String>>,
}

impl HttpSink {
    /// Creates a sink client.
    ///
    /// # Errors
    ///
    /// Returns a non-retryable transport error if the client cannot be built.
    pub fn new(config: HttpSinkConfig) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::transport_fatal(format!("failed to build client: {e}")))?;
        Ok(Self {
            config,
            client,
            last_error: RwLock::new(None),
        })
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.config.server_url
    }

    /// Returns the last error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.server_url.trim_end_matches('/'), path)
    }

    fn fail(&self, error: SyncError) -> SyncError {
        *self.last_error.write() = Some(error.to_string());
        error
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> SyncResult<T> {
        let response = request
            .send()
            .await
            .map_err(|e| self.fail(classify(e)))?;
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.fail(classify(e)))?;

        if !status.is_success() {
            let message = serde_json::from_slice::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).into_owned());
            warn!(status = status.as_u16(), %message, "remote sink rejected request");
            return Err(self.fail(SyncError::Server {
                status: status.as_u16(),
                message,
            }));
        }

        let decoded = serde_json::from_slice(&body).map_err(|e| {
            self.fail(SyncError::Protocol(format!(
                "failed to decode response: {e}"
            )))
        })?;
        *self.last_error.write() = None;
        Ok(decoded)
    }
}

fn classify(error: reqwest::Error) -> SyncError {
    if error.is_timeout() {
        SyncError::Timeout
    } else if error.is_builder() {
        SyncError::transport_fatal(error.to_string())
    } else if error.is_decode() {
        SyncError::Protocol(error.to_string())
    } else {
        SyncError::transport_retryable(error.to_string())
    }
}

#[async_trait]
impl RemoteSink for HttpSink {
    async fn health(&self) -> SyncResult<HealthResponse> {
        let request = self
            .client
            .get(self.url(HEALTH_PATH))
            .timeout(self.config.health_timeout);
        let response: HealthResponse = self.send(request).await?;
        if !response.is_ok() {
            return Err(self.fail(SyncError::Protocol(format!(
                "unexpected health status {:?}",
                response.status
            ))));
        }
        Ok(response)
    }

    async fn append(&self, samples: Vec<Sample>) -> SyncResult<AppendResponse> {
        let count = samples.len();
        let request = self
            .client
            .post(self.url(STEPS_PATH))
            .json(&AppendRequest::new(samples));
        let response: AppendResponse = self.send(request).await?;
        debug!(sent = count, saved = response.saved, "samples appended");
        Ok(response)
    }

    async fn list(&self) -> SyncResult<ListResponse> {
        self.send(self.client.get(self.url(STEPS_PATH))).await
    }

    async fn delete_all(&self) -> SyncResult<DeleteResponse> {
        self.send(self.client.delete(self.url(STEPS_PATH))).await
    }
}
