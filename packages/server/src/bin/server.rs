//! Whisper chat relay server.
//!
//! Accepts length-prefixed JSON connections, relays chat messages to every other
//! connected session and serves a read-only dashboard over HTTP.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin whisper-server
//! cargo run --bin whisper-server -- --port 9999 --dashboard-port 8080 --log-file server.log
//! ```

use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;
use whisper_server::{
    config::ServerConfig,
    domain::{EventSink, HistoryBuffer},
    infrastructure::{
        event_sink::{FileEventSink, TracingEventSink},
        repository::InMemorySessionRegistry,
    },
    ui::Server,
    usecase::{
        Broadcaster, EventHub, GetStatusUseCase, HeartbeatMonitor, SessionManager,
        SessionSettings,
    },
};
use whisper_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "whisper-server")]
#[command(about = "Chat relay server with message history and heartbeat eviction", long_about = None)]
struct Args {
    /// Host address to bind both listeners to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port number of the chat listener
    #[arg(short = 'p', long, default_value = "9999")]
    port: u16,

    /// Port number of the HTTP dashboard
    #[arg(long, default_value = "8080")]
    dashboard_port: u16,

    /// Number of recent messages replayed to joining clients
    #[arg(long, default_value = "50")]
    history_capacity: usize,

    /// Largest accepted frame payload in bytes
    #[arg(long, default_value = "65536")]
    max_frame_size: usize,

    /// Seconds a new connection has to send its join frame
    #[arg(long, default_value = "10")]
    join_timeout_secs: u64,

    /// Seconds between heartbeat sweeps
    #[arg(long, default_value = "30")]
    heartbeat_interval_secs: u64,

    /// Seconds without traffic before a session is probed and then evicted
    #[arg(long, default_value = "120")]
    inactivity_timeout_secs: u64,

    /// Append server events to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            dashboard_port: args.dashboard_port,
            history_capacity: args.history_capacity,
            max_frame_size: args.max_frame_size,
            join_timeout: Duration::from_secs(args.join_timeout_secs),
            heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs),
            inactivity_timeout: Duration::from_secs(args.inactivity_timeout_secs),
            log_file: args.log_file,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), "info");

    let config = ServerConfig::from(Args::parse());
    if let Err(e) = config.validate() {
        tracing::error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    // Initialize dependencies in order:
    // 1. Event sinks
    // 2. Registry
    // 3. UseCases
    // 4. Server

    // 1. Create event sinks (tracing + optional log file)
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut sinks: Vec<Arc<dyn EventSink>> = vec![Arc::new(TracingEventSink::new())];
    if let Some(path) = &config.log_file {
        match FileEventSink::open(path).await {
            Ok(sink) => {
                tracing::info!("Logging events to {}", path.display());
                sinks.push(Arc::new(sink));
            }
            Err(e) => {
                tracing::error!("Failed to open log file {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    }
    let events = Arc::new(EventHub::new(
        clock.clone(),
        config.recent_events_capacity,
        sinks,
    ));

    // 2. Create Registry (in-memory)
    let registry = Arc::new(InMemorySessionRegistry::new());

    // 3. Create UseCases
    let broadcaster = Arc::new(Broadcaster::new(
        registry.clone(),
        HistoryBuffer::new(config.history_capacity),
        config.max_frame_size,
    ));
    let session_manager = Arc::new(SessionManager::new(
        SessionSettings::from(&config),
        registry.clone(),
        broadcaster,
        events.clone(),
        clock,
    ));
    let heartbeat_monitor = Arc::new(HeartbeatMonitor::new(
        registry.clone(),
        config.heartbeat_interval,
        config.inactivity_timeout,
    ));
    let get_status_usecase = Arc::new(GetStatusUseCase::new(registry, events.clone()));

    // 4. Create and run the server
    let server = Server::new(
        config,
        session_manager,
        heartbeat_monitor,
        get_status_usecase,
        events,
    );
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
