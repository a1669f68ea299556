//! UseCase: ダッシュボード向けの状態取得
//!
//! ## テスト実装の作業記録
//!
//! ### 何をテストしているか
//! - GetStatusUseCase::execute() メソッド
//!
//! ### どのような状況を想定しているか
//! - 正常系：接続中セッションと直近イベントの集計
//! - エッジケース：セッションが 1 つもない

use std::sync::Arc;

use crate::domain::{SessionRegistry, SessionSummary, StatusSnapshot};

use super::EventHub;

/// 状態取得のユースケース
pub struct GetStatusUseCase {
    /// Registry（セッション管理の抽象化）
    registry: Arc<dyn SessionRegistry>,
    events: Arc<EventHub>,
}

impl GetStatusUseCase {
    /// 新しい GetStatusUseCase を作成
    pub fn new(registry: Arc<dyn SessionRegistry>, events: Arc<EventHub>) -> Self {
        Self { registry, events }
    }

    /// 現在の状態のスナップショットを取得
    pub async fn execute(&self) -> StatusSnapshot {
        let sessions: Vec<SessionSummary> = self
            .registry
            .snapshot()
            .await
            .iter()
            .map(|session| SessionSummary {
                session_id: *session.id(),
                display_name: session.display_name().clone(),
                peer: session.peer().map(str::to_string),
                connected_at: session.connected_at(),
                last_active_at: session.last_active_at(),
            })
            .collect();

        StatusSnapshot {
            active_session_count: sessions.len(),
            sessions,
            recent_events: self.events.recent().await,
            message_count: self.events.message_count(),
        }
    }
}
