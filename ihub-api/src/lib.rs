//! ihub-api library interface
//!
//! HTTP service that analyzes uploaded inspection photographs: runs the
//! configured detection passes, classifies severity, tags the scene and keeps
//! results in memory for later retrieval as JSON, image or PDF report.

pub mod annotate;
pub mod api;
pub mod detector;
pub mod error;
pub mod pdf;
pub mod pipeline;
pub mod storage;
pub mod store;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::Router;
use chrono::{DateTime, Utc};
use ihub_common::config::ServerConfig;
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::annotate::Annotator;
use crate::detector::DetectionSource;
use crate::storage::FileStorage;
use crate::store::AnalysisStore;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Analysis results by id
    pub store: AnalysisStore,
    /// Uploaded and annotated image files
    pub storage: FileStorage,
    /// Model passes run on every upload
    pub detector: Arc<dyn DetectionSource>,
    pub annotator: Arc<Annotator>,
    pub server: Arc<ServerConfig>,
    /// Service startup timestamp for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        store: AnalysisStore,
        storage: FileStorage,
        detector: Arc<dyn DetectionSource>,
        annotator: Annotator,
        server: ServerConfig,
    ) -> Self {
        Self {
            store,
            storage,
            detector,
            annotator: Arc::new(annotator),
            server: Arc::new(server),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.server.cors_origins);
    let body_limit = DefaultBodyLimit::max(state.server.max_upload_bytes);

    Router::new()
        .merge(api::analysis_routes().layer(body_limit))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let values: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin: {}", o);
                    None
                }
            })
            .collect();
        AllowOrigin::list(values)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

/// Periodically evict analyses older than the retention policy's max age
pub fn spawn_retention_sweep(state: AppState, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = state.store.purge_expired(Utc::now()).await;
            if !evicted.is_empty() {
                info!(count = evicted.len(), "Evicted expired analyses");
                state.storage.remove_files(&evicted).await;
            }
        }
    })
}
