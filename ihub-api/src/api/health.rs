//! Health check and service banner

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status ("healthy")
    pub status: String,
    /// Service name ("insight-hub")
    pub service: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Results currently held in memory
    pub stored_analyses: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);

    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "insight-hub".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime.num_seconds().max(0) as u64,
        stored_analyses: state.store.len().await,
    })
}

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({ "message": format!("InsightHub v{}", env!("CARGO_PKG_VERSION")) }))
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
}
