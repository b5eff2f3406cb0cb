//! # EmailLogRepository
//!
//! フォローアップメールの送信ログの永続化を担当するリポジトリ。
//! 送信成功・失敗どちらも記録する。

use async_trait::async_trait;
use followupmate_domain::notification::EmailLog;
use sqlx::PgPool;

use crate::error::InfraError;

/// 送信ログリポジトリトレイト
#[async_trait]
pub trait EmailLogRepository: Send + Sync {
    /// 送信ログを挿入する
    async fn insert(&self, log: &EmailLog) -> Result<(), InfraError>;
}

/// PostgreSQL 実装の EmailLogRepository
#[derive(Debug, Clone)]
pub struct PostgresEmailLogRepository {
    pool: PgPool,
}

impl PostgresEmailLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailLogRepository for PostgresEmailLogRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(followup_id = %log.followup_id))]
    async fn insert(&self, log: &EmailLog) -> Result<(), InfraError> {
        let status: &str = log.status.into();
        sqlx::query(
            r#"
            INSERT INTO email_logs (
                id, followup_id, recipient, subject, attempt_number,
                status, message_id, error_message, sent_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(log.id.as_uuid())
        .bind(log.followup_id.as_uuid())
        .bind(log.recipient.as_str())
        .bind(log.subject.as_str())
        .bind(i32::try_from(log.attempt_number).unwrap_or(i32::MAX))
        .bind(status)
        .bind(log.message_id.as_ref().map(|m| m.as_str()))
        .bind(log.error_message.as_deref())
        .bind(log.sent_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
