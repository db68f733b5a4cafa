//! HTTP API
//!
//! Exposes the consumer API of the cache coordinator as JSON, plus health
//! and Prometheus metrics endpoints, using Axum.

use crate::error::LadderError;
use crate::service::app::AppState;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::types::{CacheInfo, DataKind, Match, PlayerId, RatingChange};
use anyhow::{Context, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// A match together with the rating changes it produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchView {
    #[serde(flatten)]
    pub record: Match,
    /// Empty when the match was skipped during replay
    pub rating_changes: Vec<RatingChange>,
}

/// Body of `POST /api/preview`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewRequest {
    pub team_a: [PlayerId; 2],
    pub team_b: [PlayerId; 2],
}

/// Response of `POST /api/check`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResponse {
    pub reloaded: bool,
    pub cache: CacheInfo,
}

/// Error returned by API handlers
pub struct ApiError(anyhow::Error);

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.downcast_ref::<LadderError>() {
            Some(LadderError::PlayerNotFound { .. }) => StatusCode::NOT_FOUND,
            Some(LadderError::InvalidPreview { .. }) => StatusCode::BAD_REQUEST,
            Some(LadderError::RemoteFetch { .. }) | Some(LadderError::StalenessCheck { .. }) => {
                StatusCode::BAD_GATEWAY
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            warn!("Request failed: {:#}", self.0);
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

/// Build the router over a shared application state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/players", get(players_handler))
        .route("/api/players/{id}", get(player_handler))
        .route("/api/matches", get(matches_handler))
        .route("/api/cache", get(cache_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/api/check", post(check_handler))
        .route("/api/invalidate", post(invalidate_handler))
        .route("/api/preview", post(preview_handler))
        .with_state(state)
}

/// HTTP server with broadcast-driven graceful shutdown
pub struct ApiServer {
    addr: String,
    state: Arc<AppState>,
    shutdown_tx: broadcast::Sender<()>,
}

impl ApiServer {
    pub fn new(addr: impl Into<String>, state: Arc<AppState>) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            addr: addr.into(),
            state,
            shutdown_tx,
        }
    }

    /// Serve until `stop` is called
    pub async fn start(&self) -> Result<()> {
        let addr: SocketAddr = self.addr.parse().context("Invalid HTTP server address")?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        info!("HTTP API listening on http://{}", addr);

        let mut shutdown_rx = self.shutdown_tx.subscribe();
        axum::serve(listener, router(self.state.clone()))
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("HTTP API shutdown signal received");
            })
            .await?;

        info!("HTTP API stopped");
        Ok(())
    }

    pub fn stop(&self) {
        if self.shutdown_tx.send(()).is_err() {
            debug!("HTTP API was not running");
        }
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Health check requested");
    let health = HealthCheck::check(&state).await;
    let status = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(health))
}

async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics().encode_text() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}

async fn players_handler(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<crate::types::PlayerStats>> {
    Ok(Json(state.coordinator().get_player_stats().await?))
}

async fn player_handler(
    State(state): State<Arc<AppState>>,
    Path(player_id): Path<PlayerId>,
) -> ApiResult<crate::cache::PlayerHistory> {
    Ok(Json(
        state.coordinator().get_player_history(player_id).await?,
    ))
}

async fn matches_handler(State(state): State<Arc<AppState>>) -> ApiResult<Vec<MatchView>> {
    let snapshot = state.coordinator().get(DataKind::Matches).await?;
    let views = snapshot
        .matches
        .iter()
        .map(|record| MatchView {
            record: record.clone(),
            rating_changes: snapshot
                .changes_for(record.id)
                .map(|c| c.changes.clone())
                .unwrap_or_default(),
        })
        .collect();
    Ok(Json(views))
}

async fn cache_handler(State(state): State<Arc<AppState>>) -> Json<CacheInfo> {
    Json(state.coordinator().get_cache_info())
}

async fn refresh_handler(State(state): State<Arc<AppState>>) -> ApiResult<CacheInfo> {
    let coordinator = state.coordinator();
    coordinator.refresh().await?;
    Ok(Json(coordinator.get_cache_info()))
}

async fn check_handler(State(state): State<Arc<AppState>>) -> ApiResult<CheckResponse> {
    let coordinator = state.coordinator();
    let reloaded = coordinator.check_and_reload_if_stale().await?;
    Ok(Json(CheckResponse {
        reloaded,
        cache: coordinator.get_cache_info(),
    }))
}

async fn invalidate_handler(State(state): State<Arc<AppState>>) -> Json<CacheInfo> {
    let coordinator = state.coordinator();
    coordinator.invalidate().await;
    Json(coordinator.get_cache_info())
}

async fn preview_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PreviewRequest>,
) -> ApiResult<crate::rating::MatchPreview> {
    Ok(Json(
        state
            .coordinator()
            .preview_match(request.team_a, request.team_b)
            .await?,
    ))
}
