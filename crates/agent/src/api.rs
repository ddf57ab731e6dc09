//! HTTP API for container reads, health checks and Prometheus metrics

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use runclens_lib::{CacheError, Container, ContainerCache, FetchError, StructuredLogger};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ContainerCache>,
    pub logger: StructuredLogger,
    /// Cache age beyond which the agent reports itself stale
    pub stale_after: Duration,
}

impl AppState {
    pub fn new(cache: Arc<ContainerCache>, logger: StructuredLogger, stale_after: Duration) -> Self {
        Self {
            cache,
            logger,
            stale_after,
        }
    }
}

/// Failure of an on-demand read, reported as a JSON body
#[derive(Debug, thiserror::Error)]
enum ApiError {
    #[error(transparent)]
    Cache(CacheError),

    #[error("failed to list network interfaces: {0}")]
    Interfaces(FetchError),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Cache(CacheError::InvalidKey(_)) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Cache(CacheError::NotFound(_)) => (StatusCode::NOT_FOUND, self.to_string()),
            _ => (StatusCode::SERVICE_UNAVAILABLE, self.to_string()),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[derive(Debug, Deserialize)]
struct InspectParams {
    #[serde(default)]
    interfaces: bool,
}

#[derive(Serialize)]
struct ContainerResponse {
    #[serde(flatten)]
    container: Container,
    #[serde(skip_serializing_if = "Option::is_none")]
    interfaces: Option<BTreeMap<String, String>>,
}

#[derive(Serialize)]
struct RefreshResponse {
    refreshed: usize,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    containers: usize,
    last_refresh_age_secs: Option<f64>,
}

/// All cached containers, refreshed first when stale
async fn list_containers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Container>>, ApiError> {
    state.cache.list().await.map(Json).map_err(|e| {
        state.logger.log_fetch_failure("list", None, &e);
        ApiError::Cache(e)
    })
}

/// One container by pid, optionally with its network interfaces
async fn get_container(
    State(state): State<Arc<AppState>>,
    Path(pid): Path<String>,
    Query(params): Query<InspectParams>,
) -> Result<Json<ContainerResponse>, ApiError> {
    let container = state.cache.get(&pid).await.map_err(|e| {
        state.logger.log_fetch_failure("get", Some(pid.as_str()), &e);
        ApiError::Cache(e)
    })?;

    let interfaces = if params.interfaces {
        let found = state
            .cache
            .discovery()
            .assembler()
            .network_interfaces(container.pid)
            .await
            .map_err(|e| {
                state.logger.log_fetch_failure("interfaces", Some(pid.as_str()), &e);
                ApiError::Interfaces(e)
            })?;
        Some(found)
    } else {
        None
    };

    Ok(Json(ContainerResponse {
        container,
        interfaces,
    }))
}

/// Force a full refresh regardless of freshness
async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<RefreshResponse>, ApiError> {
    let containers = state.cache.refresh().await.map_err(|e| {
        state.logger.log_fetch_failure("refresh", None, &e);
        ApiError::Cache(e)
    })?;

    Ok(Json(RefreshResponse {
        refreshed: containers.len(),
    }))
}

/// Health check response - 200 while starting or fresh, 503 once the cache goes stale
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let age = state.cache.last_refresh_age().await;
    let containers = state.cache.len().await;

    let (status_code, status) = match age {
        None => (StatusCode::OK, "starting"),
        Some(age) if age <= state.stale_after => (StatusCode::OK, "healthy"),
        Some(_) => (StatusCode::SERVICE_UNAVAILABLE, "stale"),
    };

    (
        status_code,
        Json(HealthResponse {
            status,
            containers,
            last_refresh_age_secs: age.map(|a| a.as_secs_f64()),
        }),
    )
}

/// Prometheus metrics endpoint
async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/containers", get(list_containers))
        .route("/containers/:pid", get(get_container))
        .route("/refresh", post(refresh))
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Start the API server
pub async fn serve(port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
