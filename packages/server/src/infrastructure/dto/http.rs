//! Dashboard API response DTOs.

use serde::{Deserialize, Serialize};

/// `GET /api/status`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusDto {
    pub active_session_count: usize,
    pub sessions: Vec<SessionDto>,
    pub recent_events: Vec<EventDto>,
    pub message_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDto {
    pub session_id: String,
    pub display_name: String,
    /// Remote address, when known
    pub peer: Option<String>,
    /// RFC 3339
    pub connected_at: String,
    /// RFC 3339
    pub last_active_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDto {
    /// RFC 3339
    pub timestamp: String,
    pub r#type: String,
    pub message: String,
}
