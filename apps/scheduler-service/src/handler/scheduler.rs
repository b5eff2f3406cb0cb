//! # スケジューラ API ハンドラ
//!
//! 運用・動作確認用に、スケジューリングパスを 1 回だけ同期実行する。
//!
//! ```text
//! POST /internal/scheduler/run
//! ```

use std::sync::Arc;

use axum::{Json, extract::State};
use followupmate_shared::ApiResponse;

use crate::{
    error::CoreError,
    usecase::scheduling::{PassSummary, SchedulerRunner},
};

/// スケジューラハンドラーの State
pub struct SchedulerState {
    pub runner: Arc<SchedulerRunner>,
}

/// スケジューリングパスを手動実行する
///
/// 実行中のパスがあれば完了を待ってから実行し、集計を返す。
pub async fn run_scheduler(
    State(state): State<Arc<SchedulerState>>,
) -> Result<Json<ApiResponse<PassSummary>>, CoreError> {
    let summary = state.runner.run_now().await?;
    Ok(Json(ApiResponse::new(summary)))
}
