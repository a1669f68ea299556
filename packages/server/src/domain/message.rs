//! Messages relayed by the server.

use super::{DisplayName, MessageBody, Timestamp};

/// A chat line written by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub display_name: DisplayName,
    pub body: MessageBody,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub fn new(display_name: DisplayName, body: MessageBody, timestamp: Timestamp) -> Self {
        Self {
            display_name,
            body,
            timestamp,
        }
    }
}

/// A server-originated notice (join, leave, welcome, shutdown).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemMessage {
    pub body: String,
    pub timestamp: Timestamp,
}

impl SystemMessage {
    pub fn new(body: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            body: body.into(),
            timestamp,
        }
    }

    pub fn joined(name: &DisplayName, timestamp: Timestamp) -> Self {
        Self::new(format!("{} has joined the chat", name), timestamp)
    }

    pub fn left(name: &DisplayName, timestamp: Timestamp) -> Self {
        Self::new(format!("{} has left the chat", name), timestamp)
    }

    pub fn timed_out(name: &DisplayName, timestamp: Timestamp) -> Self {
        Self::new(format!("{} has left the chat (timeout)", name), timestamp)
    }

    pub fn welcome(timestamp: Timestamp) -> Self {
        Self::new(
            "Welcome to the chat! Here are the most recent messages.",
            timestamp,
        )
    }

    pub fn shutdown(timestamp: Timestamp) -> Self {
        Self::new("Server is shutting down...", timestamp)
    }
}

/// Liveness / teardown signalling. Never broadcast, never stored in history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Ping,
    Pong,
    Disconnect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Chat(ChatMessage),
    System(SystemMessage),
    Control(ControlKind),
}

impl Message {
    /// Chat and System messages may be broadcast and kept in history.
    pub fn is_broadcastable(&self) -> bool {
        !matches!(self, Message::Control(_))
    }
}

impl From<ChatMessage> for Message {
    fn from(message: ChatMessage) -> Self {
        Message::Chat(message)
    }
}

impl From<SystemMessage> for Message {
    fn from(message: SystemMessage) -> Self {
        Message::System(message)
    }
}
