use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use parser::Provider;
use pool::CredentialLimits;
use serde::Deserialize;
use serde_json::json;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AddKeyRequest {
    pub secret: String,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub search_engine_id: Option<String>,
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub monthly_limit: Option<u32>,
    #[serde(default)]
    pub priority: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateKeyRequest {
    #[serde(default)]
    pub daily_limit: Option<u32>,
    #[serde(default)]
    pub monthly_limit: Option<u32>,
    #[serde(default)]
    pub priority: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct TestKeyRequest {
    pub secret: String,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub search_engine_id: Option<String>,
}

/// Validate, probe, and append a user credential to the pool.
pub async fn add_key(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AddKeyRequest>,
) -> Response {
    let provider = request.provider.unwrap_or(Provider::NativeSerp);
    let limits = CredentialLimits {
        daily_limit: request.daily_limit,
        monthly_limit: request.monthly_limit,
        priority: request.priority,
    };
    match state
        .pool
        .add_credential(provider, &request.secret, request.search_engine_id, limits)
        .await
    {
        Ok(id) => Json(json!({ "id": id })).into_response(),
        Err(error) => ServerError::Track(error).into_response_with(state.config.dev_mode),
    }
}

/// Adjust limits or priority of a pool credential.
pub async fn update_key(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateKeyRequest>,
) -> Response {
    let limits = CredentialLimits {
        daily_limit: request.daily_limit,
        monthly_limit: request.monthly_limit,
        priority: request.priority,
    };
    match state.pool.update_credential(&id, limits).await {
        Ok(()) => Json(json!({ "updated": id })).into_response(),
        Err(error) => ServerError::Track(error).into_response_with(state.config.dev_mode),
    }
}

/// Remove a credential from the pool and the store.
pub async fn remove_key(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Response {
    match state.pool.remove_credential(&id).await {
        Ok(()) => Json(json!({ "removed": id })).into_response(),
        Err(error) => ServerError::Track(error).into_response_with(state.config.dev_mode),
    }
}

/// Probe a caller-owned secret without persisting it.
pub async fn test_key(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TestKeyRequest>,
) -> Response {
    let provider = request.provider.unwrap_or(Provider::NativeSerp);
    match state
        .pool
        .test_user_key(provider, &request.secret, request.search_engine_id.as_deref())
        .await
    {
        Ok(()) => Json(json!({ "valid": true })).into_response(),
        Err(error) => ServerError::Track(error).into_response_with(state.config.dev_mode),
    }
}
