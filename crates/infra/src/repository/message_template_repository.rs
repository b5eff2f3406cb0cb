//! # MessageTemplateRepository
//!
//! メッセージテンプレートの永続化を担当するリポジトリ。
//!
//! 取得結果は常に並び順（position, id）で返す。テンプレート選択は
//! この並び順のインデックスで行う。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followupmate_domain::{
    template::{MessageTemplate, MessageTemplateId, MessageTemplateRecord},
    user::UserId,
    value_objects::TemplateName,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// メッセージテンプレートリポジトリトレイト
#[async_trait]
pub trait MessageTemplateRepository: Send + Sync {
    /// 所有者のテンプレートを並び順で取得する
    async fn find_by_owner(&self, owner_id: &UserId) -> Result<Vec<MessageTemplate>, InfraError>;

    /// 所有者を持たないシステム既定テンプレートを並び順で取得する
    async fn find_system_defaults(&self) -> Result<Vec<MessageTemplate>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct MessageTemplateRow {
    id: Uuid,
    owner_id: Option<Uuid>,
    name: String,
    subject_pattern: String,
    body_pattern: String,
    position: i32,
    is_default: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageTemplateRow> for MessageTemplate {
    type Error = InfraError;

    fn try_from(row: MessageTemplateRow) -> Result<Self, Self::Error> {
        Ok(MessageTemplate::new(MessageTemplateRecord {
            id: MessageTemplateId::from_uuid(row.id),
            owner_id: row.owner_id.map(UserId::from_uuid),
            name: TemplateName::new(row.name)?,
            subject_pattern: row.subject_pattern,
            body_pattern: row.body_pattern,
            position: row.position,
            is_default: row.is_default,
            created_at: row.created_at,
        }))
    }
}

/// PostgreSQL 実装の MessageTemplateRepository
#[derive(Debug, Clone)]
pub struct PostgresMessageTemplateRepository {
    pool: PgPool,
}

impl PostgresMessageTemplateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageTemplateRepository for PostgresMessageTemplateRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%owner_id))]
    async fn find_by_owner(&self, owner_id: &UserId) -> Result<Vec<MessageTemplate>, InfraError> {
        let rows = sqlx::query_as::<_, MessageTemplateRow>(
            r#"
            SELECT id, owner_id, name, subject_pattern, body_pattern,
                   position, is_default, created_at
            FROM message_templates
            WHERE owner_id = $1
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MessageTemplate::try_from).collect()
    }

    #[tracing::instrument(skip_all, level = "debug")]
    async fn find_system_defaults(&self) -> Result<Vec<MessageTemplate>, InfraError> {
        let rows = sqlx::query_as::<_, MessageTemplateRow>(
            r#"
            SELECT id, owner_id, name, subject_pattern, body_pattern,
                   position, is_default, created_at
            FROM message_templates
            WHERE owner_id IS NULL
            ORDER BY position ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(MessageTemplate::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresMessageTemplateRepository>();
    }

    #[test]
    fn 所有者のない行はシステム既定テンプレートになる() {
        let template = MessageTemplate::try_from(MessageTemplateRow {
            id: Uuid::now_v7(),
            owner_id: None,
            name: "初回".to_string(),
            subject_pattern: "{{subject}}".to_string(),
            body_pattern: "{{client_name}} 様".to_string(),
            position: 0,
            is_default: true,
            created_at: Utc::now(),
        })
        .unwrap();

        assert!(template.owner_id().is_none());
        assert!(template.is_default());
    }
}
