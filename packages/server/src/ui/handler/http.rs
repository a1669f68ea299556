//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};

use crate::{infrastructure::dto::http::StatusDto, ui::state::AppState};

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Live sessions, recent events and message count
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusDto> {
    let snapshot = state.get_status_usecase.execute().await;

    // Domain Model から DTO への変換
    Json(StatusDto::from(snapshot))
}

/// Raw contents of the event log file
///
/// Returns `404` when no log file is configured.
pub async fn get_logs(State(state): State<Arc<AppState>>) -> Result<String, StatusCode> {
    let Some(path) = state.log_file.as_ref() else {
        return Err(StatusCode::NOT_FOUND);
    };

    match tokio::fs::read_to_string(path).await {
        Ok(contents) => Ok(contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!("Failed to read log file {}: {}", path.display(), e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
