//! HTTP route definitions.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::http::handlers::{
    active_batches, batch_status, health, queue_batch, resume_batch, rewind_batch, stop_batch,
};
use crate::state::AppState;

/// Create the control surface router.
///
/// ```text
/// POST /queue         - Queue a batch (202)
/// GET  /status/{id}   - Batch state
/// POST /stop          - Stop a pending or processing batch
/// GET  /active        - Pending and processing batches
/// POST /rewind        - Reset a finished batch to pending
/// POST /resume        - Start a pending or interrupted batch
/// GET  /health        - Liveness and active batch count
/// ```
pub fn create_router(state: Arc<AppState>) -> Router {
    let batch_routes = Router::new()
        .route("/queue", post(queue_batch))
        .route("/status/{batch_id}", get(batch_status))
        .route("/stop", post(stop_batch))
        .route("/active", get(active_batches))
        .route("/rewind", post(rewind_batch))
        .route("/resume", post(resume_batch))
        .with_state(state.clone());

    let monitoring_routes = Router::new()
        .route("/health", get(health))
        .with_state(state);

    Router::new()
        .merge(batch_routes)
        .merge(monitoring_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
