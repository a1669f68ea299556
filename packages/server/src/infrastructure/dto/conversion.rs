//! Conversion logic between DTOs and domain entities.

use whisper_shared::time::timestamp_to_rfc3339;

use crate::domain::{
    ControlKind, Message, ServerEvent, SessionSummary, StatusSnapshot,
};
use crate::infrastructure::dto::{http as http_dto, wire::WireMessage};

// ========================================
// Domain Entity → DTO
// ========================================

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        match message {
            Message::Chat(chat) => WireMessage::Chat {
                display_name: chat.display_name.as_str().to_string(),
                body: chat.body.as_str().to_string(),
                timestamp: chat.timestamp.value(),
            },
            Message::System(system) => WireMessage::System {
                body: system.body.clone(),
                timestamp: system.timestamp.value(),
            },
            Message::Control(kind) => WireMessage::from(*kind),
        }
    }
}

impl From<ControlKind> for WireMessage {
    fn from(kind: ControlKind) -> Self {
        match kind {
            ControlKind::Ping => WireMessage::Ping,
            ControlKind::Pong => WireMessage::Pong,
            ControlKind::Disconnect => WireMessage::Disconnect,
        }
    }
}

impl From<SessionSummary> for http_dto::SessionDto {
    fn from(summary: SessionSummary) -> Self {
        Self {
            session_id: summary.session_id.to_string(),
            display_name: summary.display_name.into_string(),
            peer: summary.peer,
            connected_at: timestamp_to_rfc3339(summary.connected_at.value()),
            last_active_at: timestamp_to_rfc3339(summary.last_active_at.value()),
        }
    }
}

impl From<ServerEvent> for http_dto::EventDto {
    fn from(event: ServerEvent) -> Self {
        Self {
            timestamp: timestamp_to_rfc3339(event.timestamp.value()),
            r#type: event.kind.as_str().to_string(),
            message: event.detail,
        }
    }
}

impl From<StatusSnapshot> for http_dto::StatusDto {
    fn from(snapshot: StatusSnapshot) -> Self {
        Self {
            active_session_count: snapshot.active_session_count,
            sessions: snapshot.sessions.into_iter().map(Into::into).collect(),
            recent_events: snapshot.recent_events.into_iter().map(Into::into).collect(),
            message_count: snapshot.message_count,
        }
    }
}
