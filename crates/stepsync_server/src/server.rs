//! HTTP front end for the remote sink.

use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use stepsync_protocol::{
    AppendResponse, DeleteResponse, HealthResponse, ListResponse, HEALTH_PATH, STEPS_PATH,
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::RequestHandler;
use crate::store::SampleStore;

/// The remote sink server.
///
/// Wraps a [`RequestHandler`] in an axum router. File access runs on the
/// blocking pool.
pub struct SinkServer {
    config: ServerConfig,
    handler: Arc<RequestHandler>,
}

impl SinkServer {
    /// Creates a server, opening the store in the configured data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory cannot be created.
    pub fn new(config: ServerConfig) -> ServerResult<Self> {
        let store = Arc::new(SampleStore::open(&config.data_dir)?);
        Ok(Self {
            config,
            handler: Arc::new(RequestHandler::new(store)),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the request handler.
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Builds the router.
    pub fn router(&self) -> Router {
        let mut app = Router::new()
            .route(HEALTH_PATH, get(health))
            .route(
                STEPS_PATH,
                get(list_steps).post(append_steps).delete(delete_steps),
            )
            .layer(match self.config.max_body_bytes {
                Some(limit) => DefaultBodyLimit::max(limit),
                None => DefaultBodyLimit::disable(),
            })
            .layer(TimeoutLayer::new(self.config.request_timeout))
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.handler));

        if self.config.cors {
            app = app.layer(CorsLayer::permissive());
        }
        app
    }

    /// Binds the configured address and serves until the process exits.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Serves on `listener` until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        info!(
            %addr,
            data = %self.handler.store().path().display(),
            "remote sink listening"
        );
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        info!("remote sink stopped");
        Ok(())
    }
}

async fn blocking<T, F>(handler: Arc<RequestHandler>, f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce(&RequestHandler) -> ServerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&handler))
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
}

async fn health(State(handler): State<Arc<RequestHandler>>) -> Json<HealthResponse> {
    Json(handler.health())
}

async fn append_steps(
    State(handler): State<Arc<RequestHandler>>,
    body: Result<Bytes, BytesRejection>,
) -> ServerResult<Json<AppendResponse>> {
    let body = body.map_err(|rejection| {
        ServerError::InvalidRequest(format!("Request body rejected: {}", rejection.body_text()))
    })?;
    blocking(handler, move |h| h.append(&body)).await.map(Json)
}

async fn list_steps(
    State(handler): State<Arc<RequestHandler>>,
) -> ServerResult<Json<ListResponse<Value>>> {
    blocking(handler, |h| h.list()).await.map(Json)
}

async fn delete_steps(
    State(handler): State<Arc<RequestHandler>>,
) -> ServerResult<Json<DeleteResponse>> {
    blocking(handler, |h| h.delete_all()).await.map(Json)
}
