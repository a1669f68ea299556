//! Operational events emitted by the core (connect, disconnect, errors, shutdown).
//!
//! The core only emits; durability is up to the [`EventSink`] implementations.

use std::fmt;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use super::Timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    Server,
    Connect,
    Disconnect,
    Message,
    Error,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Server => "SERVER",
            EventKind::Connect => "CONNECT",
            EventKind::Disconnect => "DISCONNECT",
            EventKind::Message => "MESSAGE",
            EventKind::Error => "ERROR",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerEvent {
    pub kind: EventKind,
    pub detail: String,
    pub timestamp: Timestamp,
}

impl ServerEvent {
    pub fn new(kind: EventKind, detail: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            kind,
            detail: detail.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Error)]
pub enum EventSinkError {
    #[error("failed to write event: {0}")]
    Io(#[from] std::io::Error),
}

/// Receiver of structured event records.
///
/// ## 依存性の逆転（DIP）
///
/// コア（UseCase 層）はこの trait にのみ依存し、ログファイルや tracing などの
/// 具体的な出力先は Infrastructure 層が提供する。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn on_event(&self, event: &ServerEvent) -> Result<(), EventSinkError>;
}
