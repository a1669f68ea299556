//! Repository trait 定義
//!
//! ドメイン層が必要とするセッション管理のインターフェースを定義します。
//! 具体的な実装は Infrastructure 層が提供します（依存性の逆転）。

use std::sync::Arc;

use async_trait::async_trait;

use super::{RegistryError, Session, SessionId};

/// Session Registry trait
///
/// アクティブなセッションの共有テーブル。
///
/// ## 排他制御の規律
///
/// - 実装は 1 つのロックでマップを保護し、ロックはメモリ上の変更・コピーの間だけ保持する
/// - ネットワーク I/O の間はロックを保持しない（呼び出し側は `snapshot` のコピーを使う）
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// セッションを登録（同じ ID が既に存在する場合はエラー）
    async fn register(&self, session: Arc<Session>) -> Result<(), RegistryError>;

    /// セッションを削除（冪等: 2 回目以降は `None`）
    async fn deregister(&self, id: &SessionId) -> Option<Arc<Session>>;

    /// 登録中のセッションの時点コピー（接続時刻順）
    async fn snapshot(&self) -> Vec<Arc<Session>>;

    /// 登録中のセッション数
    async fn count(&self) -> usize;
}
