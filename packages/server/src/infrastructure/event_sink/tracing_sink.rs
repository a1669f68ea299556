//! EventSink that re-emits events as tracing records.

use async_trait::async_trait;

use crate::domain::{EventKind, EventSink, EventSinkError, ServerEvent};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl TracingEventSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for TracingEventSink {
    async fn on_event(&self, event: &ServerEvent) -> Result<(), EventSinkError> {
        match event.kind {
            EventKind::Error => tracing::error!("[{}] {}", event.kind, event.detail),
            _ => tracing::info!("[{}] {}", event.kind, event.detail),
        }
        Ok(())
    }
}
