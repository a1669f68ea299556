//! Event emission hook: stamps events, keeps the recent ones for the dashboard and
//! fans them out to the configured sinks.

use std::{
    collections::VecDeque,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use tokio::sync::Mutex;
use whisper_shared::time::Clock;

use crate::domain::{EventKind, EventSink, ServerEvent, Timestamp};

pub struct EventHub {
    clock: Arc<dyn Clock>,
    sinks: Vec<Arc<dyn EventSink>>,
    recent: Mutex<VecDeque<ServerEvent>>,
    recent_capacity: usize,
    message_count: AtomicU64,
}

impl EventHub {
    pub fn new(
        clock: Arc<dyn Clock>,
        recent_capacity: usize,
        sinks: Vec<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            clock,
            sinks,
            recent: Mutex::new(VecDeque::with_capacity(recent_capacity)),
            recent_capacity,
            message_count: AtomicU64::new(0),
        }
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// Record an event. Sink failures are logged and otherwise ignored.
    pub async fn emit(&self, kind: EventKind, detail: impl Into<String>) -> ServerEvent {
        let event = ServerEvent::new(kind, detail, self.now());

        if kind == EventKind::Message {
            self.message_count.fetch_add(1, Ordering::Relaxed);
        }

        if self.recent_capacity > 0 {
            let mut recent = self.recent.lock().await;
            while recent.len() >= self.recent_capacity {
                recent.pop_front();
            }
            recent.push_back(event.clone());
        }

        for sink in &self.sinks {
            if let Err(e) = sink.on_event(&event).await {
                tracing::warn!("Failed to write {} event: {}", kind, e);
            }
        }

        event
    }

    /// Recent events, oldest first.
    pub async fn recent(&self) -> Vec<ServerEvent> {
        self.recent.lock().await.iter().cloned().collect()
    }

    pub fn message_count(&self) -> u64 {
        self.message_count.load(Ordering::Relaxed)
    }
}
