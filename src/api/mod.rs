//! HTTP API — Axum server exposing the price oracle.
//!
//! JSON endpoints for lookups, formatted responses, alert thresholds
//! and history. CORS enabled for local development.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use routes::AppState;

/// Bind the API port and serve in a background task.
///
/// Binding happens before returning, so a port conflict is reported to
/// the caller instead of killing the task.
pub async fn spawn_api(state: AppState, port: u16) -> Result<tokio::task::JoinHandle<()>> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API port {port}"))?;
    info!(port, "API server listening on http://localhost:{port}");

    Ok(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server error");
        }
    }))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/price", get(routes::get_price))
        .route("/api/quick", get(routes::get_quick))
        .route("/api/analysis", get(routes::get_analysis))
        .route("/api/format", get(routes::get_formatted))
        .route(
            "/api/alerts",
            axum::routing::post(routes::post_alert).delete(routes::delete_alert),
        )
        .route("/api/history", get(routes::get_history))
        .route("/api/cache", get(routes::get_cache_stats))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
