//! Server execution logic.

use std::{future::Future, io, net::SocketAddr, sync::Arc};

use thiserror::Error;
use tokio::net::TcpListener;
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    config::{ConfigError, ServerConfig},
    domain::EventKind,
    usecase::{EventHub, GetStatusUseCase, HeartbeatMonitor, SessionManager},
};

use super::{
    handler::dashboard_router, listener::accept_loop, signal::shutdown_signal, state::AppState,
};

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("listener failed: {0}")]
    Accept(#[source] io::Error),

    #[error("dashboard failed: {0}")]
    Dashboard(#[source] io::Error),
}

/// Chat relay server
///
/// # Example
///
/// ```ignore
/// let server = Server::new(
///     config,
///     session_manager,
///     heartbeat_monitor,
///     get_status_usecase,
///     events,
/// );
/// server.run().await?;
/// ```
pub struct Server {
    config: ServerConfig,
    /// SessionManager（セッション管理のユースケース）
    session_manager: Arc<SessionManager>,
    /// HeartbeatMonitor（無応答セッション検出のユースケース）
    heartbeat_monitor: Arc<HeartbeatMonitor>,
    /// GetStatusUseCase（状態取得のユースケース）
    get_status_usecase: Arc<GetStatusUseCase>,
    events: Arc<EventHub>,
}

impl Server {
    /// Create a new Server instance
    pub fn new(
        config: ServerConfig,
        session_manager: Arc<SessionManager>,
        heartbeat_monitor: Arc<HeartbeatMonitor>,
        get_status_usecase: Arc<GetStatusUseCase>,
        events: Arc<EventHub>,
    ) -> Self {
        Self {
            config,
            session_manager,
            heartbeat_monitor,
            get_status_usecase,
            events,
        }
    }

    /// Bind the chat and dashboard listeners without serving yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or either address cannot be bound.
    pub async fn bind(self) -> Result<BoundServer, ServerError> {
        self.config.validate()?;

        let chat_listener = bind_listener(&self.config.host, self.config.port).await?;
        let dashboard_listener =
            bind_listener(&self.config.host, self.config.dashboard_port).await?;

        let chat_addr = local_addr(&chat_listener)?;
        let dashboard_addr = local_addr(&dashboard_listener)?;

        Ok(BoundServer {
            server: self,
            chat_listener,
            dashboard_listener,
            chat_addr,
            dashboard_addr,
        })
    }

    /// Bind and serve until Ctrl+C / SIGTERM.
    pub async fn run(self) -> Result<(), ServerError> {
        self.bind().await?.serve(shutdown_signal()).await
    }
}

/// A server whose listeners are bound.
pub struct BoundServer {
    server: Server,
    chat_listener: TcpListener,
    dashboard_listener: TcpListener,
    chat_addr: SocketAddr,
    dashboard_addr: SocketAddr,
}

impl BoundServer {
    pub fn chat_addr(&self) -> SocketAddr {
        self.chat_addr
    }

    pub fn dashboard_addr(&self) -> SocketAddr {
        self.dashboard_addr
    }

    /// Serve until `shutdown` resolves or the chat listener fails.
    ///
    /// On shutdown: stop accepting, broadcast the shutdown notice, close every session,
    /// wait for the session workers, then stop the heartbeat monitor and the dashboard.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send,
    {
        let Self {
            server,
            chat_listener,
            dashboard_listener,
            chat_addr,
            dashboard_addr,
        } = self;
        let config = server.config;

        let stop = CancellationToken::new();
        let tracker = TaskTracker::new();

        // Heartbeat
        let heartbeat = {
            let monitor = server.heartbeat_monitor.clone();
            let stop = stop.clone();
            tokio::spawn(async move { monitor.run(stop).await })
        };

        // Dashboard
        let app_state = Arc::new(AppState {
            get_status_usecase: server.get_status_usecase.clone(),
            log_file: config.log_file.clone(),
        });
        let dashboard = {
            let app = dashboard_router(app_state);
            let stop = stop.clone();
            tokio::spawn(async move {
                axum::serve(dashboard_listener, app)
                    .with_graceful_shutdown(stop.cancelled_owned())
                    .await
            })
        };

        tracing::info!("Chat server listening on {}", chat_addr);
        tracing::info!("Dashboard listening on http://{}", dashboard_addr);
        tracing::info!("Press Ctrl+C to shutdown gracefully");
        server
            .events
            .emit(
                EventKind::Server,
                format!("Server started on {}", chat_addr),
            )
            .await;

        // Accept loop
        let result = tokio::select! {
            e = accept_loop(chat_listener, server.session_manager.clone(), tracker.clone()) => {
                tracing::error!("Chat listener failed: {}", e);
                server
                    .events
                    .emit(EventKind::Error, format!("Listener failed: {}", e))
                    .await;
                Err(ServerError::Accept(e))
            }
            _ = shutdown => Ok(()),
        };

        // Shutdown
        server
            .session_manager
            .shutdown(config.shutdown_grace)
            .await;

        tracker.close();
        let drain_timeout = config.shutdown_grace + config.write_timeout;
        if tokio::time::timeout(drain_timeout, tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                "{} session workers still running after {:?}",
                tracker.len(),
                drain_timeout
            );
        }

        stop.cancel();
        if let Err(e) = heartbeat.await {
            tracing::warn!("Heartbeat task failed: {}", e);
        }
        let dashboard_result = match dashboard.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                tracing::error!("Dashboard failed: {}", e);
                Err(ServerError::Dashboard(e))
            }
            Err(e) => {
                tracing::warn!("Dashboard task failed: {}", e);
                Ok(())
            }
        };

        server
            .events
            .emit(EventKind::Server, "Server shutdown complete")
            .await;
        tracing::info!("Server shutdown complete");

        result.and(dashboard_result)
    }
}

async fn bind_listener(host: &str, port: u16) -> Result<TcpListener, ServerError> {
    let addr = format!("{}:{}", host, port);
    TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })
}

fn local_addr(listener: &TcpListener) -> Result<SocketAddr, ServerError> {
    listener.local_addr().map_err(|source| ServerError::Bind {
        addr: "listener".to_string(),
        source,
    })
}
