pub mod health;
pub mod keys;
pub mod track;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

/// API information endpoint
pub async fn api_info() -> impl IntoResponse {
    Json(json!({
        "name": "serptrack",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "track": "POST /api/v1/track",
            "pool_stats": "GET /api/v1/pool/stats",
            "add_key": "POST /api/v1/pool/keys",
            "update_key": "PUT /api/v1/pool/keys/{id}",
            "remove_key": "DELETE /api/v1/pool/keys/{id}",
            "test_key": "POST /api/v1/pool/keys/test",
            "health": "GET /health",
        }
    }))
}

/// Fallback handler for unknown routes
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": { "code": "NOT_FOUND", "message": "Unknown route" }
        })),
    )
}
