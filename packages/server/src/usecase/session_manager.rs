//! UseCase: セッションのライフサイクル管理
//!
//! 受け付けた接続 1 本につき `handle_connection` が 1 回呼ばれ、そのタスクが
//! 接続の終了まで Joining → Active → Closing → Closed の状態遷移を駆動する。
//!
//! - Joining: 最初のフレームが `join` であることを待つ（タイムアウトあり）。失敗時は登録も通知もせず閉じる
//! - Active: Registry 登録・履歴リプレイ・ウェルカム通知・参加通知の後、受信ループを回す
//! - Closing: Registry から削除し（冪等）、その後に退出通知をブロードキャストする（1 回だけ）
//! - Closed: 送信タスクを止めてトランスポートを解放する
//!
//! 送信は送信キューを読む 1 本の writer タスクだけが行う（セッションごとのシングルライター）。

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::mpsc,
};
use tokio_util::{codec::Framed, sync::CancellationToken};
use whisper_shared::time::Clock;

use crate::{
    config::ServerConfig,
    domain::{
        ChatMessage, CloseReason, ControlKind, DisplayName, EventKind, MessageBody,
        Session, SessionId, SessionRegistry, SystemMessage, Timestamp,
    },
    infrastructure::{
        codec::{FrameCodec, FramingError, encode_payload},
        dto::wire::WireMessage,
    },
};

use super::{Broadcaster, EventHub, error::SessionError};

/// Per-connection limits.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub join_timeout: Duration,
    pub max_frame_size: usize,
    pub outbound_queue_capacity: usize,
    pub write_timeout: Duration,
}

impl From<&ServerConfig> for SessionSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            join_timeout: config.join_timeout,
            max_frame_size: config.max_frame_size,
            outbound_queue_capacity: config.outbound_queue_capacity,
            write_timeout: config.write_timeout,
        }
    }
}

/// セッション管理のユースケース（接続ごとの制御フローの中心）
pub struct SessionManager {
    settings: SessionSettings,
    /// Registry（セッション管理の抽象化）
    registry: Arc<dyn SessionRegistry>,
    broadcaster: Arc<Broadcaster>,
    events: Arc<EventHub>,
    clock: Arc<dyn Clock>,
    /// Cancelled once server shutdown begins; no session is admitted afterwards.
    shutdown: CancellationToken,
}

impl SessionManager {
    /// 新しい SessionManager を作成
    pub fn new(
        settings: SessionSettings,
        registry: Arc<dyn SessionRegistry>,
        broadcaster: Arc<Broadcaster>,
        events: Arc<EventHub>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            registry,
            broadcaster,
            events,
            clock,
            shutdown: CancellationToken::new(),
        }
    }

    fn now(&self) -> Timestamp {
        Timestamp::new(self.clock.now_millis())
    }

    /// 接続を最後まで処理する
    ///
    /// # Arguments
    ///
    /// * `transport` - 受け付けた双方向バイトストリーム（このタスクが排他的に所有する）
    /// * `peer` - ログ用の接続元アドレス
    pub async fn handle_connection<T>(&self, transport: T, peer: Option<String>)
    where
        T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let framed = Framed::new(
            transport,
            FrameCodec::with_max_size(self.settings.max_frame_size),
        );
        let (sink, mut stream) = framed.split::<Bytes>();
        let peer_label = peer.clone().unwrap_or_else(|| "unknown".to_string());

        // 1. Joining
        let display_name = match self.await_join(&mut stream).await {
            Ok(name) => name,
            Err(SessionError::JoinAborted) => {
                tracing::debug!(peer = %peer_label, "Connection closed before join");
                return;
            }
            Err(e) => {
                tracing::warn!(peer = %peer_label, "Join handshake failed: {}", e);
                self.events
                    .emit(
                        EventKind::Error,
                        format!("Join from {} rejected: {}", peer_label, e),
                    )
                    .await;
                return;
            }
        };

        // 2. Registry 登録と履歴リプレイ
        let (tx, rx) = mpsc::channel(self.settings.outbound_queue_capacity);
        let session = Arc::new(Session::new(
            SessionId::generate(),
            display_name,
            self.now(),
            peer,
            tx,
        ));
        let name = session.display_name().clone();

        let welcome = SystemMessage::welcome(self.now());
        match self.broadcaster.admit(session.clone(), Some(welcome)).await {
            Ok(replayed) => {
                tracing::debug!(
                    session_id = %session.id(),
                    "Replayed {} history entries to '{}'",
                    replayed,
                    name
                );
            }
            Err(e) => {
                let e = SessionError::from(e);
                tracing::error!(session_id = %session.id(), "Registry invariant violated: {}", e);
                self.events
                    .emit(EventKind::Error, format!("{} rejected: {}", name, e))
                    .await;
                session.request_close(CloseReason::DuplicateRegistration);
                session.mark_closed();
                return;
            }
        }

        // shutdown started while this session was being admitted
        if self.shutdown.is_cancelled() {
            session.request_close(CloseReason::ServerShutdown);
        }

        // 3. Active: writer を起動し、参加通知を送る（ウェルカム通知は admit でキュー投入済み）
        let writer = tokio::spawn(write_loop(
            sink,
            rx,
            session.clone(),
            self.settings.write_timeout,
        ));

        self.events
            .emit(
                EventKind::Connect,
                format!("{} connected from {}", name, peer_label),
            )
            .await;
        self.announce(SystemMessage::joined(&name, self.now()), Some(session.id()))
            .await;

        // 4. 受信ループ
        let reason = self.receive_loop(&session, &mut stream).await;

        // 5. Closing
        self.teardown(&session, reason).await;

        // 6. Closed
        session.request_close(reason);
        if let Err(e) = writer.await {
            tracing::warn!(session_id = %session.id(), "Writer task for '{}' failed: {}", name, e);
        }
        session.mark_closed();
        tracing::debug!(session_id = %session.id(), "Session '{}' closed ({})", name, reason);
    }

    async fn await_join<S>(&self, stream: &mut S) -> Result<DisplayName, SessionError>
    where
        S: Stream<Item = Result<WireMessage, FramingError>> + Unpin,
    {
        let first = tokio::select! {
            _ = self.shutdown.cancelled() => return Err(SessionError::JoinAborted),
            first = tokio::time::timeout(self.settings.join_timeout, stream.next()) => first,
        };

        match first {
            Err(_) => Err(SessionError::JoinTimeout(self.settings.join_timeout)),
            Ok(None) => Err(SessionError::JoinAborted),
            Ok(Some(Err(e))) => Err(SessionError::Framing(e)),
            Ok(Some(Ok(WireMessage::Join { display_name }))) => DisplayName::new(display_name)
                .map_err(|e| SessionError::InvalidJoin(e.to_string())),
            Ok(Some(Ok(other))) => Err(SessionError::InvalidJoin(format!(
                "expected join, got {}",
                other.kind()
            ))),
        }
    }

    async fn receive_loop<S>(&self, session: &Session, stream: &mut S) -> CloseReason
    where
        S: Stream<Item = Result<WireMessage, FramingError>> + Unpin,
    {
        loop {
            let next = tokio::select! {
                _ = session.closed() => {
                    return session.close_reason().unwrap_or(CloseReason::ServerShutdown);
                }
                next = stream.next() => next,
            };

            let message = match next {
                None => return CloseReason::EndOfStream,
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    tracing::warn!(session_id = %session.id(), "Receive failed for '{}': {}", session.display_name(), e);
                    self.events
                        .emit(
                            EventKind::Error,
                            format!("Error handling client {}: {}", session.display_name(), e),
                        )
                        .await;
                    return if e.is_transport() {
                        CloseReason::TransportError
                    } else {
                        CloseReason::FramingError
                    };
                }
            };

            session.touch();

            match message {
                WireMessage::Chat { body, .. } => self.handle_chat(session, body).await,
                WireMessage::Ping => {
                    if let Err(e) = self.send_direct(session, &WireMessage::from(ControlKind::Pong)) {
                        tracing::warn!(session_id = %session.id(), "Failed to answer ping: {}", e);
                        return CloseReason::DeliveryFailed;
                    }
                }
                WireMessage::Pong => {
                    tracing::trace!(session_id = %session.id(), "Pong received");
                }
                WireMessage::Disconnect => return CloseReason::ClientDisconnect,
                other @ (WireMessage::Join { .. } | WireMessage::System { .. }) => {
                    tracing::warn!(
                        session_id = %session.id(),
                        "Ignoring unexpected '{}' frame from '{}'",
                        other.kind(),
                        session.display_name()
                    );
                }
            }
        }
    }

    async fn handle_chat(&self, session: &Session, body: String) {
        let body = match MessageBody::new(body) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(session_id = %session.id(), "Dropping chat from '{}': {}", session.display_name(), e);
                return;
            }
        };

        self.events
            .emit(
                EventKind::Message,
                format!("{}: {}", session.display_name(), body.as_str()),
            )
            .await;

        let chat = ChatMessage::new(session.display_name().clone(), body, self.now());
        if let Err(e) = self
            .broadcaster
            .broadcast(chat.into(), Some(session.id()))
            .await
        {
            tracing::warn!(session_id = %session.id(), "Failed to broadcast chat: {}", e);
            self.events
                .emit(
                    EventKind::Error,
                    format!("Broadcast from {} failed: {}", session.display_name(), e),
                )
                .await;
        }
    }

    /// Active → Closing の後処理（Registry 削除 → 退出通知）
    ///
    /// # Returns
    ///
    /// `true` if this call performed the teardown, `false` if it had already happened.
    pub async fn teardown(&self, session: &Session, reason: CloseReason) -> bool {
        if !session.begin_closing() {
            return false;
        }

        // deregister before broadcasting so the leaver never sees its own notice
        self.registry.deregister(session.id()).await;

        let name = session.display_name();
        self.events
            .emit(
                EventKind::Disconnect,
                format!("{} disconnected ({})", name, reason),
            )
            .await;

        let notice = match reason {
            CloseReason::ServerShutdown => None,
            CloseReason::HeartbeatTimeout => Some(SystemMessage::timed_out(name, self.now())),
            _ => Some(SystemMessage::left(name, self.now())),
        };
        if let Some(notice) = notice {
            self.announce(notice, None).await;
        }

        true
    }

    /// Broadcast a shutdown notice, wait `grace`, then close every session.
    ///
    /// Each session unwinds through its own worker; callers wait on those workers.
    pub async fn shutdown(&self, grace: Duration) {
        self.shutdown.cancel();
        self.events
            .emit(EventKind::Server, "Server shutting down")
            .await;
        self.announce(SystemMessage::shutdown(self.now()), None).await;

        if !grace.is_zero() {
            tokio::time::sleep(grace).await;
        }

        for session in self.registry.snapshot().await {
            session.request_close(CloseReason::ServerShutdown);
        }
    }

    async fn announce(&self, notice: SystemMessage, exclude: Option<&SessionId>) {
        if let Err(e) = self.broadcaster.announce(notice, exclude).await {
            tracing::warn!("Failed to broadcast system notice: {}", e);
        }
    }

    /// Queue a message for one session only (not broadcast, not stored in history).
    fn send_direct(&self, session: &Session, message: &WireMessage) -> Result<(), SessionError> {
        let payload = encode_payload(message)?;
        session.deliver(payload)?;
        Ok(())
    }
}

/// Drains a session's outbound queue onto the transport. The only writer for that transport.
async fn write_loop<S>(
    mut sink: S,
    mut outbound: mpsc::Receiver<Bytes>,
    session: Arc<Session>,
    write_timeout: Duration,
) where
    S: Sink<Bytes, Error = FramingError> + Unpin,
{
    loop {
        tokio::select! {
            biased;
            payload = outbound.recv() => match payload {
                Some(payload) => {
                    if let Err(e) = write_frame(&mut sink, payload, write_timeout).await {
                        tracing::warn!(session_id = %session.id(), "Failed to write to '{}': {}", session.display_name(), e);
                        session.request_close(CloseReason::TransportError);
                        break;
                    }
                }
                None => break,
            },
            _ = session.closed() => {
                // flush what was queued before the close request (e.g. the shutdown notice)
                while let Ok(payload) = outbound.try_recv() {
                    if write_frame(&mut sink, payload, write_timeout).await.is_err() {
                        break;
                    }
                }
                break;
            }
        }
    }

    outbound.close();
    match tokio::time::timeout(write_timeout, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(session_id = %session.id(), "Failed to close transport: {}", e);
        }
        Err(_) => {
            tracing::debug!(
                session_id = %session.id(),
                "Transport close timed out after {:?}",
                write_timeout
            );
        }
    }
}

async fn write_frame<S>(sink: &mut S, payload: Bytes, write_timeout: Duration) -> Result<(), SessionError>
where
    S: Sink<Bytes, Error = FramingError> + Unpin,
{
    match tokio::time::timeout(write_timeout, sink.send(payload)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) if e.is_transport() => Err(SessionError::Transport(e.to_string())),
        Ok(Err(e)) => Err(SessionError::Framing(e)),
        Err(_) => Err(SessionError::Transport(format!(
            "write timed out after {:?}",
            write_timeout
        ))),
    }
}
