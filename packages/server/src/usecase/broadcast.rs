//! UseCase: ブロードキャスト処理
//!
//! ## 責務
//!
//! - メッセージを 1 度だけエンコードし、Registry スナップショットの全セッションへ配送する
//! - チャットメッセージを履歴（HistoryBuffer）に追加する。参加・退出などの通知（`announce`）は
//!   履歴に残さず、その時点でオンラインのセッションにだけ届ける
//! - 新規セッションの登録と履歴リプレイを、ブロードキャストと矛盾しない順序で行う
//!
//! ## 設計ノート
//!
//! 履歴への追加と Registry スナップショットの取得は、同じ履歴ロックの中で行う。
//! 登録（`admit`）も履歴ロックの中で「リプレイとウェルカム通知のキュー投入 → Registry 登録」
//! を行うため、並行するブロードキャストは新規セッションに対して「履歴リプレイ」か
//! 「ライブ配送」のどちらか一方でちょうど 1 回だけ届き、ライブ配送は必ずウェルカム通知の後になる。

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use crate::{
    domain::{
        CloseReason, HistoryBuffer, Message, RegistryError, Session, SessionId, SessionRegistry,
        SystemMessage,
    },
    infrastructure::{
        codec::{FramingError, encode_payload},
        dto::wire::WireMessage,
    },
};

use super::error::BroadcastError;

/// 1 回のブロードキャストの配送結果
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BroadcastReport {
    /// 送信キューに投入できたセッション
    pub delivered: Vec<SessionId>,
    /// 配送に失敗し、切断を要求したセッション
    pub failed: Vec<SessionId>,
}

/// ブロードキャストのユースケース
pub struct Broadcaster {
    /// Registry（セッション管理の抽象化）
    registry: Arc<dyn SessionRegistry>,
    /// 直近メッセージの履歴
    history: Mutex<HistoryBuffer>,
    /// 1 フレームの最大ペイロードサイズ
    max_frame_size: usize,
}

impl Broadcaster {
    /// 新しい Broadcaster を作成
    pub fn new(
        registry: Arc<dyn SessionRegistry>,
        history: HistoryBuffer,
        max_frame_size: usize,
    ) -> Self {
        Self {
            registry,
            history: Mutex::new(history),
            max_frame_size,
        }
    }

    /// メッセージをブロードキャスト
    ///
    /// # Arguments
    ///
    /// * `message` - Chat または System メッセージ
    /// * `exclude` - 配送しないセッション（送信者自身など）
    ///
    /// # Returns
    ///
    /// * `Ok(BroadcastReport)` - 配送結果（一部の失敗は許容し、失敗したセッションは切断を要求済み）
    /// * `Err(BroadcastError)` - Control メッセージ、またはエンコード失敗
    pub async fn broadcast(
        &self,
        message: Message,
        exclude: Option<&SessionId>,
    ) -> Result<BroadcastReport, BroadcastError> {
        if !message.is_broadcastable() {
            return Err(BroadcastError::NotBroadcastable);
        }
        let payload = self.encode(&message)?;

        // 1. 履歴への追加と配送対象の確定（同じロックの中で）
        let targets = {
            let mut history = self.history.lock().await;
            history.append(message);
            self.registry.snapshot().await
        };

        // 2. ロック解放後に各セッションの送信キューへ投入
        Ok(deliver_all(targets, payload, exclude))
    }

    /// 履歴に残さない System 通知（参加・退出・シャットダウン）をブロードキャスト
    ///
    /// 送信時点で Registry にいるセッションにだけ届き、後から参加したセッションには
    /// リプレイされない。
    pub async fn announce(
        &self,
        notice: SystemMessage,
        exclude: Option<&SessionId>,
    ) -> Result<BroadcastReport, BroadcastError> {
        let payload = self.encode(&Message::System(notice))?;
        let targets = self.registry.snapshot().await;

        Ok(deliver_all(targets, payload, exclude))
    }

    /// 新規セッションを登録し、履歴を古い順にリプレイする
    ///
    /// # Arguments
    ///
    /// * `session` - 参加するセッション
    /// * `welcome` - リプレイの直後に送る通知（リプレイの終端を示す）。履歴には残さない
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - リプレイしたメッセージ数
    /// * `Err(RegistryError)` - 同じ ID が既に登録済み（セッションは Active にならない）
    pub async fn admit(
        &self,
        session: Arc<Session>,
        welcome: Option<SystemMessage>,
    ) -> Result<usize, RegistryError> {
        let history = self.history.lock().await;

        let mut replayed = 0;
        for message in history.iter() {
            let payload = match self.encode(message) {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!("Skipping history entry that cannot be encoded: {}", e);
                    continue;
                }
            };
            match session.deliver(payload) {
                Ok(()) => replayed += 1,
                Err(e) => {
                    tracing::warn!(
                        session_id = %session.id(),
                        "History replay truncated: {}",
                        e
                    );
                    break;
                }
            }
        }

        // queued before registration, so no live broadcast can overtake it
        if let Some(welcome) = welcome {
            match self.encode(&Message::System(welcome)) {
                Ok(payload) => {
                    if let Err(e) = session.deliver(payload) {
                        tracing::warn!(session_id = %session.id(), "Failed to queue welcome: {}", e);
                        session.request_close(CloseReason::DeliveryFailed);
                    }
                }
                Err(e) => tracing::warn!("Welcome notice cannot be encoded: {}", e),
            }
        }

        self.registry.register(session.clone()).await?;
        session.activate();

        Ok(replayed)
    }

    /// 履歴のコピー（古い順）
    pub async fn history(&self) -> Vec<Message> {
        self.history.lock().await.snapshot()
    }

    fn encode(&self, message: &Message) -> Result<Bytes, FramingError> {
        let payload = encode_payload(&WireMessage::from(message))?;
        if payload.len() > self.max_frame_size {
            return Err(FramingError::FrameTooLarge {
                length: payload.len(),
                max: self.max_frame_size,
            });
        }
        Ok(payload)
    }
}

fn deliver_all(
    targets: Vec<Arc<Session>>,
    payload: Bytes,
    exclude: Option<&SessionId>,
) -> BroadcastReport {
    let mut report = BroadcastReport::default();
    for session in targets {
        if Some(session.id()) == exclude {
            continue;
        }
        match session.deliver(payload.clone()) {
            Ok(()) => report.delivered.push(*session.id()),
            Err(e) => {
                // ブロードキャストでは一部の送信失敗を許容（再送はしない）
                tracing::warn!(
                    session_id = %session.id(),
                    "Failed to deliver to '{}': {}",
                    session.display_name(),
                    e
                );
                session.request_close(CloseReason::DeliveryFailed);
                report.failed.push(*session.id());
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{ChatMessage, ControlKind, DisplayName, MessageBody, Timestamp},
        infrastructure::repository::InMemorySessionRegistry,
    };
    use tokio::sync::mpsc;

    // ========================================
    // テスト作業記録
    // ========================================
    // 【何をテストするか】
    // - broadcast: 送信者以外の全セッションへの配送と履歴への追加
    // - 配送失敗時の扱い（他のセッションへの配送は継続し、失敗したセッションは切断要求）
    // - admit: 履歴リプレイと Registry 登録
    // ========================================

    struct Fixture {
        registry: Arc<InMemorySessionRegistry>,
        broadcaster: Broadcaster,
    }

    fn create_fixture(history_capacity: usize) -> Fixture {
        let registry = Arc::new(InMemorySessionRegistry::new());
        let broadcaster = Broadcaster::new(
            registry.clone(),
            HistoryBuffer::new(history_capacity),
            64 * 1024,
        );
        Fixture {
            registry,
            broadcaster,
        }
    }

    fn create_session(name: &str, queue: usize) -> (Arc<Session>, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(queue);
        let session = Arc::new(Session::new(
            SessionId::generate(),
            DisplayName::new(name.to_string()).unwrap(),
            Timestamp::new(0),
            None,
            tx,
        ));
        (session, rx)
    }

    fn chat(name: &str, body: &str) -> Message {
        Message::Chat(ChatMessage::new(
            DisplayName::new(name.to_string()).unwrap(),
            MessageBody::new(body.to_string()).unwrap(),
            Timestamp::new(1000),
        ))
    }

    fn decode(payload: &Bytes) -> WireMessage {
        serde_json::from_slice(payload).unwrap()
    }

    #[tokio::test]
    async fn test_broadcast_reaches_everyone_but_sender() {
        // テスト項目: K セッション中、送信者以外の K-1 セッションに配送される
        // given (前提条件):
        let fixture = create_fixture(10);
        let (alice, mut alice_rx) = create_session("alice", 8);
        let (bob, mut bob_rx) = create_session("bob", 8);
        let (charlie, mut charlie_rx) = create_session("charlie", 8);
        for session in [&alice, &bob, &charlie] {
            fixture.broadcaster.admit(session.clone(), None).await.unwrap();
        }

        // when (操作):
        let report = fixture
            .broadcaster
            .broadcast(chat("alice", "hi"), Some(alice.id()))
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered.len(), 2);
        assert!(report.failed.is_empty());
        assert!(alice_rx.try_recv().is_err());
        assert!(matches!(decode(&bob_rx.try_recv().unwrap()), WireMessage::Chat { body, .. } if body == "hi"));
        assert!(matches!(decode(&charlie_rx.try_recv().unwrap()), WireMessage::Chat { body, .. } if body == "hi"));
    }

    #[tokio::test]
    async fn test_broadcast_skips_deregistered_sessions() {
        // テスト項目: Registry から削除されたセッションには配送されない
        // given (前提条件):
        let fixture = create_fixture(10);
        let (alice, _alice_rx) = create_session("alice", 8);
        let (bob, mut bob_rx) = create_session("bob", 8);
        fixture.broadcaster.admit(alice.clone(), None).await.unwrap();
        fixture.broadcaster.admit(bob.clone(), None).await.unwrap();
        fixture.registry.deregister(bob.id()).await;

        // when (操作):
        let report = fixture
            .broadcaster
            .broadcast(chat("alice", "anyone?"), Some(alice.id()))
            .await
            .unwrap();

        // then (期待する結果):
        assert!(report.delivered.is_empty());
        assert!(bob_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_block_others() {
        // テスト項目: 1 セッションへの配送失敗が他のセッションへの配送を妨げず、失敗側は切断要求される
        // given (前提条件):
        let fixture = create_fixture(10);
        let (dead, dead_rx) = create_session("dead", 8);
        let (bob, mut bob_rx) = create_session("bob", 8);
        fixture.broadcaster.admit(dead.clone(), None).await.unwrap();
        fixture.broadcaster.admit(bob.clone(), None).await.unwrap();
        drop(dead_rx);

        // when (操作):
        let report = fixture
            .broadcaster
            .broadcast(Message::System(SystemMessage::new("notice", Timestamp::new(1))), None)
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(report.failed, vec![*dead.id()]);
        assert_eq!(report.delivered, vec![*bob.id()]);
        assert!(bob_rx.try_recv().is_ok());
        assert_eq!(dead.close_reason(), Some(CloseReason::DeliveryFailed));
    }

    #[tokio::test]
    async fn test_control_messages_are_rejected() {
        // テスト項目: Control メッセージはブロードキャストできず、履歴にも残らない
        // given (前提条件):
        let fixture = create_fixture(10);

        // when (操作):
        let result = fixture
            .broadcaster
            .broadcast(Message::Control(ControlKind::Ping), None)
            .await;

        // then (期待する結果):
        assert!(matches!(result, Err(BroadcastError::NotBroadcastable)));
        assert!(fixture.broadcaster.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_admit_replays_history_oldest_first() {
        // テスト項目: 新規セッションに履歴が古い順にリプレイされ、その後 Active になる
        // given (前提条件):
        let fixture = create_fixture(10);
        fixture.broadcaster.broadcast(chat("alice", "first"), None).await.unwrap();
        fixture.broadcaster.broadcast(chat("alice", "second"), None).await.unwrap();
        let (charlie, mut charlie_rx) = create_session("charlie", 8);

        // when (操作):
        let replayed = fixture.broadcaster.admit(charlie.clone(), None).await.unwrap();

        // then (期待する結果):
        assert_eq!(replayed, 2);
        assert!(matches!(decode(&charlie_rx.try_recv().unwrap()), WireMessage::Chat { body, .. } if body == "first"));
        assert!(matches!(decode(&charlie_rx.try_recv().unwrap()), WireMessage::Chat { body, .. } if body == "second"));
        assert_eq!(charlie.state(), crate::domain::SessionState::Active);
        assert_eq!(fixture.registry.count().await, 1);
    }

    #[tokio::test]
    async fn test_admit_duplicate_keeps_session_out_of_active() {
        // テスト項目: 重複登録のセッションは Active にならずエラーが返される
        // given (前提条件):
        let fixture = create_fixture(10);
        let (alice, _rx) = create_session("alice", 8);
        fixture.registry.register(alice.clone()).await.unwrap();

        // when (操作):
        let result = fixture.broadcaster.admit(alice.clone(), None).await;

        // then (期待する結果):
        assert!(matches!(result, Err(RegistryError::DuplicateRegistration(_))));
        assert_eq!(alice.state(), crate::domain::SessionState::Joining);
    }

    #[tokio::test]
    async fn test_oversized_message_is_rejected_before_delivery() {
        // テスト項目: 最大フレームサイズを超えるメッセージは配送前にエラーになる
        // given (前提条件):
        let registry = Arc::new(InMemorySessionRegistry::new());
        let broadcaster = Broadcaster::new(registry, HistoryBuffer::new(10), 16);

        // when (操作):
        let result = broadcaster.broadcast(chat("alice", "this is far too long"), None).await;

        // then (期待する結果):
        assert!(matches!(
            result,
            Err(BroadcastError::Framing(FramingError::FrameTooLarge { .. }))
        ));
        assert!(broadcaster.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_announce_is_not_recorded_in_history() {
        // テスト項目: 通知は送信時点のセッションにだけ届き、履歴には残らない
        // given (前提条件):
        let fixture = create_fixture(10);
        let (alice, mut alice_rx) = create_session("alice", 8);
        fixture.broadcaster.admit(alice.clone(), None).await.unwrap();

        // when (操作):
        let report = fixture
            .broadcaster
            .announce(SystemMessage::new("bob has joined the chat", Timestamp::new(1)), None)
            .await
            .unwrap();
        let (charlie, mut charlie_rx) = create_session("charlie", 8);
        let replayed = fixture.broadcaster.admit(charlie.clone(), None).await.unwrap();

        // then (期待する結果):
        assert_eq!(report.delivered, vec![*alice.id()]);
        assert!(matches!(decode(&alice_rx.try_recv().unwrap()), WireMessage::System { body, .. } if body == "bob has joined the chat"));
        assert_eq!(replayed, 0);
        assert!(charlie_rx.try_recv().is_err());
        assert!(fixture.broadcaster.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_admit_queues_welcome_between_replay_and_live_messages() {
        // テスト項目: ウェルカム通知はリプレイの直後、ライブ配送より前にキューに入る
        // given (前提条件):
        let fixture = create_fixture(10);
        fixture.broadcaster.broadcast(chat("alice", "before"), None).await.unwrap();
        let (bob, mut bob_rx) = create_session("bob", 8);

        // when (操作):
        fixture
            .broadcaster
            .admit(bob.clone(), Some(SystemMessage::welcome(Timestamp::new(2))))
            .await
            .unwrap();
        fixture.broadcaster.broadcast(chat("alice", "after"), None).await.unwrap();

        // then (期待する結果):
        assert!(matches!(decode(&bob_rx.try_recv().unwrap()), WireMessage::Chat { body, .. } if body == "before"));
        assert!(matches!(decode(&bob_rx.try_recv().unwrap()), WireMessage::System { body, .. } if body.starts_with("Welcome")));
        assert!(matches!(decode(&bob_rx.try_recv().unwrap()), WireMessage::Chat { body, .. } if body == "after"));
        assert!(bob_rx.try_recv().is_err());
        assert_eq!(fixture.broadcaster.history().await.len(), 2);
    }
}
