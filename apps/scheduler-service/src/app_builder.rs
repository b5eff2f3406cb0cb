//! # アプリケーション構築
//!
//! State の組み立てとルーター構築を担当する。
//! `main.rs` はインフラ初期化とサーバー起動に集中する。

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::trace::TraceLayer;

use crate::handler::{
    FollowUpApiState,
    SchedulerState,
    create_followup,
    delete_followup,
    health_check,
    list_followups,
    mark_replied,
    reschedule_followup,
    run_scheduler,
    update_followup_status,
};

/// ルーターを構築する
pub fn build_router(
    followup_state: Arc<FollowUpApiState>,
    scheduler_state: Arc<SchedulerState>,
) -> Router {
    let followups = Router::new()
        .route(
            "/internal/follow-ups",
            get(list_followups).post(create_followup),
        )
        .route(
            "/internal/follow-ups/{id}",
            delete(delete_followup),
        )
        .route(
            "/internal/follow-ups/{id}/status",
            put(update_followup_status),
        )
        .route(
            "/internal/follow-ups/{id}/schedule",
            put(reschedule_followup),
        )
        .route("/internal/follow-ups/{id}/replied", post(mark_replied))
        .with_state(followup_state);

    let scheduler = Router::new()
        .route("/internal/scheduler/run", post(run_scheduler))
        .with_state(scheduler_state);

    Router::new()
        .route("/health", get(health_check))
        .merge(followups)
        .merge(scheduler)
        .layer(TraceLayer::new_for_http())
}
