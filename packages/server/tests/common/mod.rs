//! Shared fixtures for the integration tests: an in-process relay driven over
//! in-memory duplex transports.

#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use tokio::{io::DuplexStream, task::JoinHandle};
use tokio_util::codec::Framed;
use whisper_server::{
    config::ServerConfig,
    domain::{EventKind, EventSink, HistoryBuffer, SessionRegistry},
    infrastructure::{
        codec::FrameCodec, dto::wire::WireMessage, repository::InMemorySessionRegistry,
    },
    usecase::{
        Broadcaster, EventHub, GetStatusUseCase, HeartbeatMonitor, SessionManager,
        SessionSettings,
    },
};
use whisper_shared::time::{Clock, SystemClock};

pub type Client = Framed<DuplexStream, FrameCodec>;

pub const WELCOME: &str = "Welcome to the chat! Here are the most recent messages.";

/// The whole core wired the way the binary wires it, minus the listeners.
pub struct Relay {
    pub config: ServerConfig,
    pub registry: Arc<InMemorySessionRegistry>,
    pub events: Arc<EventHub>,
    pub manager: Arc<SessionManager>,
    pub monitor: Arc<HeartbeatMonitor>,
    pub status: Arc<GetStatusUseCase>,
}

impl Relay {
    pub fn new(config: ServerConfig) -> Self {
        Self::with_sinks(config, Vec::new())
    }

    pub fn with_sinks(config: ServerConfig, sinks: Vec<Arc<dyn EventSink>>) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let registry = Arc::new(InMemorySessionRegistry::new());
        let events = Arc::new(EventHub::new(
            clock.clone(),
            config.recent_events_capacity,
            sinks,
        ));
        let broadcaster = Arc::new(Broadcaster::new(
            registry.clone(),
            HistoryBuffer::new(config.history_capacity),
            config.max_frame_size,
        ));
        let manager = Arc::new(SessionManager::new(
            SessionSettings::from(&config),
            registry.clone(),
            broadcaster,
            events.clone(),
            clock,
        ));
        let monitor = Arc::new(HeartbeatMonitor::new(
            registry.clone(),
            config.heartbeat_interval,
            config.inactivity_timeout,
        ));
        let status = Arc::new(GetStatusUseCase::new(registry.clone(), events.clone()));

        Self {
            config,
            registry,
            events,
            manager,
            monitor,
            status,
        }
    }

    /// Open a transport to the relay; the returned handle is the session worker.
    pub fn connect(&self) -> (Client, JoinHandle<()>) {
        let (client, server) = tokio::io::duplex(256 * 1024);
        let manager = self.manager.clone();
        let worker = tokio::spawn(async move {
            manager
                .handle_connection(server, Some("in-memory".to_string()))
                .await
        });
        (Framed::new(client, FrameCodec::new()), worker)
    }

    /// Connect and join as `name`. Returns the replayed history (everything before the welcome).
    pub async fn join(&self, name: &str) -> (Client, JoinHandle<()>, Vec<WireMessage>) {
        let (mut client, worker) = self.connect();
        client
            .send(WireMessage::Join {
                display_name: name.to_string(),
            })
            .await
            .expect("send join");

        let mut replay = Vec::new();
        loop {
            let message = recv(&mut client).await;
            if system_body(&message) == Some(WELCOME) {
                break;
            }
            replay.push(message);
        }
        (client, worker, replay)
    }

    pub async fn session_count(&self) -> usize {
        self.registry.count().await
    }

    pub async fn count_events(&self, kind: EventKind, detail_prefix: &str) -> usize {
        self.events
            .recent()
            .await
            .iter()
            .filter(|e| e.kind == kind && e.detail.starts_with(detail_prefix))
            .count()
    }
}

/// Configuration with short timeouts for real-time tests.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        dashboard_port: 0,
        shutdown_grace: Duration::ZERO,
        ..ServerConfig::default()
    }
}

pub async fn recv(client: &mut Client) -> WireMessage {
    tokio::time::timeout(Duration::from_secs(10), client.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("frame decode failed")
}

/// `true` once the server has closed the transport.
pub async fn is_closed(client: &mut Client) -> bool {
    matches!(
        tokio::time::timeout(Duration::from_secs(10), client.next()).await,
        Ok(None) | Ok(Some(Err(_)))
    )
}

pub fn system_body(message: &WireMessage) -> Option<&str> {
    match message {
        WireMessage::System { body, .. } => Some(body.as_str()),
        _ => None,
    }
}

pub fn chat(body: &str) -> WireMessage {
    WireMessage::Chat {
        display_name: String::new(),
        body: body.to_string(),
        timestamp: 0,
    }
}
