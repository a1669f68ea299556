//! Shared state of the dashboard handlers.

use std::{path::PathBuf, sync::Arc};

use crate::usecase::GetStatusUseCase;

/// Shared application state
pub struct AppState {
    /// GetStatusUseCase（状態取得のユースケース）
    pub get_status_usecase: Arc<GetStatusUseCase>,
    /// Event log served by `/api/logs`
    pub log_file: Option<PathBuf>,
}
