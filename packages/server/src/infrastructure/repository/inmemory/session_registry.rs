//! InMemory Session Registry 実装
//!
//! ドメイン層が定義する SessionRegistry trait の具体的な実装。
//! HashMap をインメモリのセッションテーブルとして使用します。
//!
//! ロックは HashMap の変更・コピーの間だけ保持され、セッションへの送信など
//! I/O を伴う処理は常に `snapshot` で取得したコピーに対して行われます。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{RegistryError, Session, SessionId, SessionRegistry};

/// インメモリ Session Registry 実装
#[derive(Default)]
pub struct InMemorySessionRegistry {
    /// Key: SessionId, Value: Session
    sessions: Mutex<HashMap<SessionId, Arc<Session>>>,
}

impl InMemorySessionRegistry {
    /// 新しい InMemorySessionRegistry を作成
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionRegistry for InMemorySessionRegistry {
    async fn register(&self, session: Arc<Session>) -> Result<(), RegistryError> {
        let mut sessions = self.sessions.lock().await;
        let id = *session.id();
        if sessions.contains_key(&id) {
            return Err(RegistryError::DuplicateRegistration(id));
        }
        sessions.insert(id, session);
        tracing::debug!(session_id = %id, "Session registered");
        Ok(())
    }

    async fn deregister(&self, id: &SessionId) -> Option<Arc<Session>> {
        let removed = self.sessions.lock().await.remove(id);
        if removed.is_some() {
            tracing::debug!(session_id = %id, "Session deregistered");
        }
        removed
    }

    async fn snapshot(&self) -> Vec<Arc<Session>> {
        let mut snapshot: Vec<Arc<Session>> = {
            let sessions = self.sessions.lock().await;
            sessions.values().cloned().collect()
        };
        snapshot.sort_by(|a, b| {
            a.connected_at()
                .cmp(&b.connected_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        snapshot
    }

    async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
