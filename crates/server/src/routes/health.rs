use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

/// Liveness check
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness: the pool must hold at least one credential
pub async fn readiness_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.pool.stats();
    Json(json!({
        "ready": stats.total > 0,
        "credentials": stats.total,
        "active": stats.active,
    }))
}

/// Current pool statistics
pub async fn pool_stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.pool.stats())
}
