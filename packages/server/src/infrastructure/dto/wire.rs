//! Messages carried inside transport frames.

use serde::{Deserialize, Serialize};

/// JSON payload of a frame, tagged by `"type"`.
///
/// | type | direction |
/// |---|---|
/// | `join` | client → server |
/// | `chat` | both |
/// | `system` | server → client |
/// | `ping` | both (server probe, or client keepalive) |
/// | `pong` | both |
/// | `disconnect` | client → server |
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    Join {
        display_name: String,
    },
    Chat {
        /// Ignored on inbound frames; the server stamps the session's own name.
        #[serde(default)]
        display_name: String,
        body: String,
        /// Ignored on inbound frames; the server stamps its own clock.
        #[serde(default)]
        timestamp: i64,
    },
    System {
        body: String,
        timestamp: i64,
    },
    Ping,
    Pong,
    Disconnect,
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Join { .. } => "join",
            WireMessage::Chat { .. } => "chat",
            WireMessage::System { .. } => "system",
            WireMessage::Ping => "ping",
            WireMessage::Pong => "pong",
            WireMessage::Disconnect => "disconnect",
        }
    }
}
