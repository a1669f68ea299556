//! Dashboard HTTP routes.

mod http;

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use super::state::AppState;

pub use http::{get_logs, get_status, health_check};

/// Build the dashboard router (read-only views of the relay).
pub fn dashboard_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/status", get(get_status))
        .route("/api/logs", get(get_logs))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
