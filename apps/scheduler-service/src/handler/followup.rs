//! # フォローアップ API ハンドラ
//!
//! 認証は外部で行われ、呼び出し元が認証済みの `user_id` をクエリで渡す。
//!
//! | メソッド | パス | 処理 |
//! |---|---|---|
//! | GET | `/internal/follow-ups?user_id=` | 一覧 |
//! | POST | `/internal/follow-ups?user_id=` | 作成 |
//! | PUT | `/internal/follow-ups/{id}/status?user_id=` | ステータス変更 |
//! | PUT | `/internal/follow-ups/{id}/schedule?user_id=` | 期日変更 |
//! | POST | `/internal/follow-ups/{id}/replied?user_id=` | 返信済みにする |
//! | DELETE | `/internal/follow-ups/{id}?user_id=` | 削除 |

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, NaiveDate, Utc};
use followupmate_domain::{
    followup::{FollowUp, FollowUpId, FollowUpStatus},
    user::UserId,
};
use followupmate_shared::ApiResponse;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::CoreError,
    usecase::{CreateFollowUpInput, FollowUpUseCase},
};

/// フォローアップハンドラーの State
pub struct FollowUpApiState {
    pub usecase: FollowUpUseCase,
}

/// ユーザー指定クエリパラメータ
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user_id: Uuid,
}

/// フォローアップ作成リクエスト
#[derive(Debug, Deserialize)]
pub struct CreateFollowUpRequest {
    pub client_name:    String,
    pub client_email:   String,
    pub client_phone:   Option<String>,
    pub subject:        String,
    pub message:        Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    /// `HH:MM`
    pub follow_up_time: Option<String>,
    pub max_attempts:   Option<u32>,
}

/// ステータス変更リクエスト
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// `pending` / `completed` / `cancelled`
    pub status: String,
}

/// 期日変更リクエスト
#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub follow_up_date: NaiveDate,
    pub follow_up_time: Option<String>,
}

/// フォローアップ DTO
#[derive(Debug, Serialize)]
pub struct FollowUpDto {
    pub id: String,
    pub client_name: String,
    pub client_email: String,
    pub client_phone: Option<String>,
    pub subject: String,
    pub message: Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_time: Option<String>,
    pub status: FollowUpStatus,
    pub scheduling_state: String,
    pub attempt_count: u32,
    pub max_attempts: u32,
    pub next_due_at: Option<DateTime<Utc>>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub replied_at: Option<DateTime<Utc>>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<FollowUp> for FollowUpDto {
    fn from(f: FollowUp) -> Self {
        Self {
            id: f.id().to_string(),
            client_name: f.client_name().as_str().to_string(),
            client_email: f.client_email().as_str().to_string(),
            client_phone: f.client_phone().map(|p| p.as_str().to_string()),
            subject: f.subject().as_str().to_string(),
            message: f.message().map(|m| m.as_str().to_string()),
            follow_up_date: f.follow_up_date(),
            follow_up_time: f.follow_up_time().map(|t| t.format("%H:%M").to_string()),
            status: f.status(),
            scheduling_state: f.scheduling_state().to_string(),
            attempt_count: f.attempt_count(),
            max_attempts: f.max_attempts().as_u32(),
            next_due_at: f.next_due_at(),
            last_contacted_at: f.last_contacted_at(),
            replied_at: f.replied_at(),
            version: f.version().as_u32(),
            created_at: f.created_at(),
            updated_at: f.updated_at(),
        }
    }
}

fn ok(followup: FollowUp) -> Json<ApiResponse<FollowUpDto>> {
    Json(ApiResponse::new(FollowUpDto::from(followup)))
}

/// フォローアップ一覧を取得する
///
/// ## エンドポイント
/// GET /internal/follow-ups
pub async fn list_followups(
    State(state): State<Arc<FollowUpApiState>>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<Vec<FollowUpDto>>>, CoreError> {
    let followups = state
        .usecase
        .list(&UserId::from_uuid(query.user_id))
        .await?;
    let dtos = followups.into_iter().map(FollowUpDto::from).collect();
    Ok(Json(ApiResponse::new(dtos)))
}

/// フォローアップを作成する
///
/// ## エンドポイント
/// POST /internal/follow-ups
pub async fn create_followup(
    State(state): State<Arc<FollowUpApiState>>,
    Query(query): Query<UserQuery>,
    Json(req): Json<CreateFollowUpRequest>,
) -> Result<Response, CoreError> {
    let input = CreateFollowUpInput {
        client_name:    req.client_name,
        client_email:   req.client_email,
        client_phone:   req.client_phone,
        subject:        req.subject,
        message:        req.message,
        follow_up_date: req.follow_up_date,
        follow_up_time: req.follow_up_time,
        max_attempts:   req.max_attempts,
    };

    let followup = state
        .usecase
        .create(UserId::from_uuid(query.user_id), input)
        .await?;

    Ok((StatusCode::CREATED, ok(followup)).into_response())
}

/// ステータスを変更する
///
/// ## エンドポイント
/// PUT /internal/follow-ups/{id}/status
pub async fn update_followup_status(
    State(state): State<Arc<FollowUpApiState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<ApiResponse<FollowUpDto>>, CoreError> {
    let status: FollowUpStatus = req.status.parse()?;
    let followup = state
        .usecase
        .update_status(
            &FollowUpId::from_uuid(id),
            &UserId::from_uuid(query.user_id),
            status,
        )
        .await?;
    Ok(ok(followup))
}

/// 期日を変更する
///
/// ## エンドポイント
/// PUT /internal/follow-ups/{id}/schedule
pub async fn reschedule_followup(
    State(state): State<Arc<FollowUpApiState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<ApiResponse<FollowUpDto>>, CoreError> {
    let followup = state
        .usecase
        .reschedule(
            &FollowUpId::from_uuid(id),
            &UserId::from_uuid(query.user_id),
            req.follow_up_date,
            req.follow_up_time.as_deref(),
        )
        .await?;
    Ok(ok(followup))
}

/// 顧客から返信があったことを記録する
///
/// ## エンドポイント
/// POST /internal/follow-ups/{id}/replied
pub async fn mark_replied(
    State(state): State<Arc<FollowUpApiState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<Json<ApiResponse<FollowUpDto>>, CoreError> {
    let followup = state
        .usecase
        .mark_replied(
            &FollowUpId::from_uuid(id),
            &UserId::from_uuid(query.user_id),
        )
        .await?;
    Ok(ok(followup))
}

/// フォローアップを削除する
///
/// ## エンドポイント
/// DELETE /internal/follow-ups/{id}
pub async fn delete_followup(
    State(state): State<Arc<FollowUpApiState>>,
    Path(id): Path<Uuid>,
    Query(query): Query<UserQuery>,
) -> Result<StatusCode, CoreError> {
    state
        .usecase
        .delete(
            &FollowUpId::from_uuid(id),
            &UserId::from_uuid(query.user_id),
        )
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
