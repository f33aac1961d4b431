use std::sync::Arc;

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::error::ServerError;
use crate::facade::{bulk_insight, normalize, single_insight, NormalizedRequest, TrackRequest};
use crate::state::AppState;

/// Track a domain's rank for one keyword or a batch.
///
/// A one-element keyword list collapses to the single-lookup path. The
/// reply always carries a pool snapshot and a one-line insight.
pub async fn track(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrackRequest>,
) -> Response {
    let dev_mode = state.config.dev_mode;
    let normalized = match normalize(request) {
        Ok(normalized) => normalized,
        Err(error) => return error.into_response_with(dev_mode),
    };

    match normalized {
        NormalizedRequest::Single { keyword, options } => {
            match state.pool.track(&keyword, &options).await {
                Ok(record) => {
                    let insight = single_insight(&record);
                    Json(json!({
                        "record": record,
                        "pool": state.pool.stats(),
                        "insight": insight,
                    }))
                    .into_response()
                }
                Err(error) => ServerError::Track(error).into_response_with(dev_mode),
            }
        }
        NormalizedRequest::Bulk { keywords, options } => {
            let result = state.bulk.run(keywords, options, None).await;
            let insight = bulk_insight(&result);
            Json(json!({
                "result": result,
                "insight": insight,
            }))
            .into_response()
        }
    }
}
