//! Server initialization and routing
//!
//! This module handles the Axum server setup including:
//! - Router configuration with all API endpoints
//! - Request ID and logging middleware
//! - Graceful shutdown handling with pool and scheduler teardown

use crate::config::ServerConfig;
use crate::middleware::{log_requests, request_id};
use crate::routes::{api_info, health, keys, not_found, track};
use crate::state::AppState;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{delete, get, post, put};
use axum::Router;
use scheduler::{ResetScheduler, SchedulerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Build the Axum router with all routes and middleware
fn build_router(state: Arc<AppState>) -> Router {
    let max_body = state.config.max_body_size();
    let timeout = state.config.timeout();

    Router::new()
        .route("/", get(api_info))
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route("/api/v1/track", post(track::track))
        .route("/api/v1/pool/stats", get(health::pool_stats))
        .route("/api/v1/pool/keys", post(keys::add_key))
        .route("/api/v1/pool/keys/{id}", put(keys::update_key))
        .route("/api/v1/pool/keys/{id}", delete(keys::remove_key))
        .route("/api/v1/pool/keys/test", post(keys::test_key))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        // Later layers wrap earlier ones, so request_id sits outside the
        // access logger and the id is in place before logging reads it.
        .layer(from_fn(log_requests))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the tracking HTTP server.
///
/// Initializes structured logging, the credential pool, the bulk
/// executor, and the reset scheduler, then serves until SIGTERM or
/// Ctrl+C. On shutdown the scheduler is stopped and the pool flushes a
/// final usage snapshot.
pub async fn start_server(config: ServerConfig) -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(&config.log_level)
        .with_target(false)
        .json()
        .init();

    // Create shared state: storage, transport, pool, bulk executor
    let state = Arc::new(AppState::new(config.clone()).await?);

    // Periodic resets and cleanup
    let reset_scheduler = ResetScheduler::start(
        state.pool.clone(),
        state.store.clone(),
        SchedulerConfig {
            cleanup_retention_days: config.cleanup_retention_days,
        },
    );

    // Build router
    let app = build_router(state.clone());

    // Parse bind address
    let addr: SocketAddr = config.socket_addr()?;

    let pool_stats = state.pool.stats();
    tracing::info!(
        "Starting serptrack server on {} with {} credentials ({} active)",
        addr,
        pool_stats.total,
        pool_stats.active
    );
    tracing::info!(
        "Timeout: {}s, Max body: {}MB",
        config.timeout_secs,
        config.max_body_size_mb
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    reset_scheduler.shutdown();
    state.pool.shutdown().await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Resolves once the process is asked to stop: Ctrl+C everywhere, plus
/// SIGTERM on unix. A failed SIGTERM registration degrades to waiting on
/// Ctrl+C alone instead of refusing to serve.
async fn shutdown_signal() {
    let interrupt = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = interrupt => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(error) => {
                tracing::warn!(%error, "SIGTERM handler unavailable, waiting on Ctrl+C only");
                let _ = interrupt.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = interrupt.await;
    }

    tracing::info!("shutdown signal received, draining");
}
