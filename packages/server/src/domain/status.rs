//! Read-only view of the live server state, consumed by the dashboard.

use super::{DisplayName, ServerEvent, SessionId, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session_id: SessionId,
    pub display_name: DisplayName,
    /// Remote address, when the transport has one
    pub peer: Option<String>,
    pub connected_at: Timestamp,
    pub last_active_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub active_session_count: usize,
    pub sessions: Vec<SessionSummary>,
    pub recent_events: Vec<ServerEvent>,
    pub message_count: u64,
}
