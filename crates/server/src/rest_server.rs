//! Status API implementation using Axum

use axum::{
    extract::{Query, State},
    http::{HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use dropwatch_core::error::{Error, Result};
use dropwatch_core::{ServerConfig, StoredRecord, TaskQueue};
use dropwatch_storage::RecordStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Upper bound for `/files?limit=`
pub const MAX_FILES_LIMIT: usize = 1000;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn RecordStore>,
    pub queue: TaskQueue,
    /// Records returned by `/files` without an explicit limit
    pub recent_limit: usize,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>, queue: TaskQueue, config: &ServerConfig) -> Self {
        Self {
            store,
            queue,
            recent_limit: config.recent_limit,
        }
    }
}

/// Body of `GET /stats`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total: u64,
    pub ok: u64,
    pub failed: u64,
    /// Tasks waiting in the queue, not counting the one being processed
    pub queued: usize,
}

#[derive(Debug, Deserialize)]
struct FilesQuery {
    limit: Option<usize>,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: AppState, server_config: &ServerConfig) -> Router {
    let router = Router::new()
        .route("/health", get(health_handler))
        .route("/stats", get(stats_handler))
        .route("/files", get(files_handler));

    // Configure CORS based on allowed_origins
    let cors_layer = if server_config.allowed_origins.is_empty() {
        CorsLayer::new()
    } else if server_config.allowed_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let mut cors = CorsLayer::new()
            .allow_methods([Method::GET, Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE]);

        for origin in &server_config.allowed_origins {
            match HeaderValue::from_str(origin) {
                Ok(header_value) => cors = cors.allow_origin(header_value),
                Err(_) => warn!("Ignoring invalid CORS origin '{origin}'"),
            }
        }
        cors
    };

    router
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind the configured address
pub async fn bind(server_config: &ServerConfig) -> Result<TcpListener> {
    let addr = server_config.bind_address();
    TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::config(format!("Failed to bind to {addr}: {e}")))
}

/// Serve the status API on `listener` until `shutdown` is cancelled
pub async fn run_rest_server(
    listener: TcpListener,
    state: AppState,
    server_config: &ServerConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = build_router(state, server_config);

    if let Ok(addr) = listener.local_addr() {
        info!("Status API listening on http://{addr}");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| Error::with_context("Status API server error", e))?;

    info!("Status API stopped");
    Ok(())
}

/// GET /health
async fn health_handler(
    State(state): State<AppState>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    state.store.health_check().await.map_err(|e| {
        warn!("Health check failed: {e}");
        ApiError::ServiceUnavailable("Database connection is not available".to_string())
    })?;

    Ok(Json(serde_json::json!({ "status": "ok" })))
}

/// GET /stats
async fn stats_handler(
    State(state): State<AppState>,
) -> std::result::Result<Json<StatsResponse>, ApiError> {
    let counts = state.store.counts().await?;

    Ok(Json(StatsResponse {
        total: counts.total,
        ok: counts.ok,
        failed: counts.failed,
        queued: state.queue.size(),
    }))
}

/// GET /files?limit=N
async fn files_handler(
    State(state): State<AppState>,
    Query(query): Query<FilesQuery>,
) -> std::result::Result<Json<Vec<StoredRecord>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.recent_limit)
        .clamp(1, MAX_FILES_LIMIT);

    let records = state.store.list_recent(limit).await?;
    Ok(Json(records))
}

/// API error type
#[derive(Debug)]
pub enum ApiError {
    ServiceUnavailable(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(err) => {
                // Log the full error details for debugging
                tracing::error!("Internal server error: {err:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal server error occurred".to_string(),
                )
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Internal(err.into())
    }
}
