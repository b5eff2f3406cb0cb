//! # UserRepository
//!
//! 送信者プロフィール（表示名・メールアドレス）の参照を担当するリポジトリ。
//! ユーザーの登録・認証は外部サービスが行うため、ここでは読み取りのみ。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followupmate_domain::{
    user::{User, UserId, UserName},
    value_objects::Email,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// ユーザーリポジトリトレイト
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// ID でユーザーを取得する
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = InfraError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User::new(
            UserId::from_uuid(row.id),
            UserName::new(row.name)?,
            Email::new(row.email)?,
            row.created_at,
        ))
    }
}

/// PostgreSQL 実装の UserRepository
#[derive(Debug, Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, name, email, created_at FROM users WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::try_from).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresUserRepository>();
    }
}
