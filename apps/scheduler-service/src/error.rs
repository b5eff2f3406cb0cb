//! # スケジューラサービスのエラー定義
//!
//! - [`CoreError`]: 内部 API のユースケースエラー。RFC 7807 Problem Details に変換する
//! - [`PassItemError`]: スケジューリングパス内の 1 件分の失敗。パスの外には伝播しない

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use followupmate_domain::{
    DomainError,
    notification::DeliveryError,
    template::TemplateSelectionError,
};
use followupmate_infra::InfraError;
use followupmate_shared::event_log::error as log_error;
use serde::Serialize;
use thiserror::Error;

/// エラーレスポンス（RFC 7807 Problem Details）
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub title:      String,
    pub status:     u16,
    pub detail:     String,
}

/// 内部 API で発生するエラー
#[derive(Debug, Error)]
pub enum CoreError {
    /// リソースが見つからない
    #[error("リソースが見つかりません: {0}")]
    NotFound(String),

    /// 不正なリクエスト
    #[error("不正なリクエスト: {0}")]
    BadRequest(String),

    /// 競合（楽観的ロック失敗）
    #[error("競合が発生しました: {0}")]
    Conflict(String),

    /// データベースエラー
    #[error("データベースエラー: {0}")]
    Database(#[from] InfraError),
}

impl From<DomainError> for CoreError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::Validation(msg) => Self::BadRequest(msg),
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let (status, error_type, title, detail) = match &self {
            CoreError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                "https://followupmate.example.com/errors/not-found",
                "Not Found",
                msg.clone(),
            ),
            CoreError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "https://followupmate.example.com/errors/bad-request",
                "Bad Request",
                msg.clone(),
            ),
            CoreError::Conflict(msg) => (
                StatusCode::CONFLICT,
                "https://followupmate.example.com/errors/conflict",
                "Conflict",
                msg.clone(),
            ),
            CoreError::Database(e) => {
                tracing::error!(
                    error.category = log_error::category::INFRASTRUCTURE,
                    error.kind = log_error::kind::DATABASE,
                    span_trace = %e.span_trace(),
                    "データベースエラー: {}",
                    e
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "https://followupmate.example.com/errors/internal-error",
                    "Internal Server Error",
                    "内部エラーが発生しました".to_string(),
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error_type: error_type.to_string(),
                title: title.to_string(),
                status: status.as_u16(),
                detail,
            }),
        )
            .into_response()
    }
}

/// スケジューリングパス内の 1 件分の失敗
///
/// いずれの場合もフォローアップの状態は変更されず、次回のパスで再試行される。
#[derive(Debug, Error)]
pub enum PassItemError {
    /// 所有者のテンプレートもシステム既定テンプレートも無い
    #[error(transparent)]
    NoTemplate(#[from] TemplateSelectionError),

    /// 送信失敗（拒否・アドレス不正・タイムアウト）
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// 再取得して再適用しても競合が解消しなかった
    #[error("競合が解消しませんでした: {0}")]
    StorageConflict(InfraError),

    /// ストレージエラー
    #[error("ストレージエラー: {0}")]
    Storage(InfraError),

    /// 状態遷移が拒否された
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl PassItemError {
    /// ログ出力用の `error.category` / `error.kind`
    pub fn log_fields(&self) -> (&'static str, &'static str) {
        match self {
            Self::NoTemplate(_) => (
                log_error::category::CONFIGURATION,
                log_error::kind::NO_TEMPLATE,
            ),
            Self::Delivery(_) => (
                log_error::category::EXTERNAL_SERVICE,
                log_error::kind::DELIVERY,
            ),
            Self::StorageConflict(_) => (
                log_error::category::INFRASTRUCTURE,
                log_error::kind::CONFLICT,
            ),
            Self::Storage(_) => (
                log_error::category::INFRASTRUCTURE,
                log_error::kind::DATABASE,
            ),
            Self::Domain(_) => (log_error::category::INFRASTRUCTURE, log_error::kind::INTERNAL),
        }
    }
}

impl From<InfraError> for PassItemError {
    fn from(e: InfraError) -> Self {
        if e.is_conflict() {
            Self::StorageConflict(e)
        } else {
            Self::Storage(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(CoreError::NotFound("x".into()), StatusCode::NOT_FOUND)]
    #[case(CoreError::BadRequest("x".into()), StatusCode::BAD_REQUEST)]
    #[case(CoreError::Conflict("x".into()), StatusCode::CONFLICT)]
    #[case(CoreError::Database(InfraError::unexpected("x")), StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_エラー種別がステータスコードに対応する(
        #[case] error: CoreError,
        #[case] expected: StatusCode,
    ) {
        assert_eq!(error.into_response().status(), expected);
    }

    #[tokio::test]
    async fn test_内部エラーの詳細はレスポンスに含めない() {
        let response = CoreError::Database(InfraError::unexpected("接続文字列が漏れる")).into_response();

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], 500);
        assert_eq!(json["detail"], "内部エラーが発生しました");
    }

    #[test]
    fn test_ドメインのバリデーションエラーはbad_requestになる() {
        let err: CoreError = DomainError::Validation("件名が短すぎます".into()).into();
        assert!(matches!(err, CoreError::BadRequest(msg) if msg == "件名が短すぎます"));
    }

    #[test]
    fn test_インフラの競合はstorage_conflictに分類される() {
        let conflict: PassItemError = InfraError::conflict("FollowUp", "1").into();
        let other: PassItemError = InfraError::unexpected("boom").into();

        assert!(matches!(conflict, PassItemError::StorageConflict(_)));
        assert!(matches!(other, PassItemError::Storage(_)));
    }
}
