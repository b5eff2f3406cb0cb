//! # FollowUpRepository
//!
//! フォローアップの永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **所有者スコープ**: ユーザー操作向けの検索・削除は所有者 ID で絞り込む
//! - **楽観的ロック**: 更新は `version` を条件にした UPDATE のみで行い、
//!   HTTP 経由の編集とスケジューラの送信記録が互いを上書きしないようにする
//! - **期日判定**: 送信対象の抽出条件は SQL 側で評価する

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use followupmate_domain::{
    followup::{ClientPhone, FollowUp, FollowUpId, FollowUpRecord, FollowUpStatus},
    user::UserId,
    value_objects::{ClientName, Email, FollowUpMessage, MaxAttempts, Subject, Version},
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::InfraError;

/// フォローアップリポジトリトレイト
#[async_trait]
pub trait FollowUpRepository: Send + Sync {
    /// フォローアップを新規作成する
    async fn insert(&self, followup: &FollowUp) -> Result<(), InfraError>;

    /// 所有者スコープで ID 検索する
    ///
    /// 他のユーザーのフォローアップは `Ok(None)` になる。
    async fn find_by_id(
        &self,
        id: &FollowUpId,
        owner_id: &UserId,
    ) -> Result<Option<FollowUp>, InfraError>;

    /// 所有者に関係なく ID 検索する（スケジューラ専用）
    async fn find_by_id_unscoped(&self, id: &FollowUpId) -> Result<Option<FollowUp>, InfraError>;

    /// 所有者のフォローアップ一覧を作成日時の新しい順で取得する
    async fn find_by_owner(&self, owner_id: &UserId) -> Result<Vec<FollowUp>, InfraError>;

    /// 指定時刻に送信対象のフォローアップを取得する
    ///
    /// 条件: 次回期日が未設定または `now` 以前、未返信、送信回数 < 上限、
    /// ステータスが completed / cancelled 以外。
    /// 次回期日の昇順（未設定が先頭）、同じなら ID 順。
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<FollowUp>, InfraError>;

    /// バージョンを条件にフォローアップを更新する
    ///
    /// DB 上のバージョンが `expected_version` と一致しない場合は
    /// `InfraErrorKind::Conflict` を返す。
    async fn update_with_version_check(
        &self,
        followup: &FollowUp,
        expected_version: Version,
    ) -> Result<(), InfraError>;

    /// 所有者スコープで削除する
    ///
    /// 削除した場合は `true`、対象がなければ `false`。
    async fn delete(&self, id: &FollowUpId, owner_id: &UserId) -> Result<bool, InfraError>;
}

/// DB の follow_ups テーブルの行を表す中間構造体
///
/// `TryFrom` で `FollowUp` への変換ロジックを一箇所に集約する。
#[derive(sqlx::FromRow)]
struct FollowUpRow {
    id: Uuid,
    owner_id: Uuid,
    client_name: String,
    client_email: String,
    client_phone: Option<String>,
    subject: String,
    message: Option<String>,
    follow_up_date: Option<NaiveDate>,
    follow_up_time: Option<NaiveTime>,
    next_due_at: Option<DateTime<Utc>>,
    attempt_count: i32,
    max_attempts: i32,
    replied: bool,
    replied_at: Option<DateTime<Utc>>,
    exhausted_at: Option<DateTime<Utc>>,
    last_contacted_at: Option<DateTime<Utc>>,
    status: String,
    version: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<FollowUpRow> for FollowUp {
    type Error = InfraError;

    fn try_from(row: FollowUpRow) -> Result<Self, Self::Error> {
        let attempt_count = u32::try_from(row.attempt_count).map_err(|_| {
            InfraError::unexpected(format!("不正な送信回数: {}", row.attempt_count))
        })?;

        Ok(FollowUp::from_db(FollowUpRecord {
            id: FollowUpId::from_uuid(row.id),
            owner_id: UserId::from_uuid(row.owner_id),
            client_name: ClientName::new(row.client_name)?,
            client_email: Email::new(row.client_email)?,
            client_phone: row.client_phone.map(ClientPhone::new).transpose()?,
            subject: Subject::new(row.subject)?,
            message: FollowUpMessage::parse_optional(row.message)?,
            follow_up_date: row.follow_up_date,
            follow_up_time: row.follow_up_time,
            next_due_at: row.next_due_at,
            attempt_count,
            max_attempts: MaxAttempts::try_from(row.max_attempts)?,
            replied: row.replied,
            replied_at: row.replied_at,
            exhausted_at: row.exhausted_at,
            last_contacted_at: row.last_contacted_at,
            status: row
                .status
                .parse::<FollowUpStatus>()
                .map_err(|e| InfraError::unexpected(format!("不正なステータス: {e}")))?,
            version: Version::try_from(row.version)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })?)
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id, owner_id, client_name, client_email, client_phone,
        subject, message, follow_up_date, follow_up_time, next_due_at,
        attempt_count, max_attempts, replied, replied_at, exhausted_at,
        last_contacted_at, status, version, created_at, updated_at
    FROM follow_ups
"#;

fn into_followups(rows: Vec<FollowUpRow>) -> Result<Vec<FollowUp>, InfraError> {
    rows.into_iter().map(FollowUp::try_from).collect()
}

/// 行ごとに変換し、変換できない行はログに残して除外する
///
/// 送信対象の走査で使う。壊れた 1 行が他のフォローアップの送信を止めないようにする。
fn into_followups_skipping_invalid(rows: Vec<FollowUpRow>) -> Vec<FollowUp> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match FollowUp::try_from(row) {
                Ok(followup) => Some(followup),
                Err(e) => {
                    tracing::warn!(
                        followup_id = %id,
                        error = %e,
                        "フォローアップの行を復元できないため送信対象から除外します"
                    );
                    None
                }
            }
        })
        .collect()
}

/// PostgreSQL 実装の FollowUpRepository
#[derive(Debug, Clone)]
pub struct PostgresFollowUpRepository {
    pool: PgPool,
}

impl PostgresFollowUpRepository {
    /// 新しいリポジトリインスタンスを作成
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FollowUpRepository for PostgresFollowUpRepository {
    #[tracing::instrument(skip_all, level = "debug", fields(id = %followup.id()))]
    async fn insert(&self, followup: &FollowUp) -> Result<(), InfraError> {
        let status: &str = followup.status().into();
        sqlx::query(
            r#"
            INSERT INTO follow_ups (
                id, owner_id, client_name, client_email, client_phone,
                subject, message, follow_up_date, follow_up_time, next_due_at,
                attempt_count, max_attempts, replied, replied_at, exhausted_at,
                last_contacted_at, status, version, created_at, updated_at
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                $11, $12, $13, $14, $15, $16, $17, $18, $19, $20
            )
            "#,
        )
        .bind(followup.id().as_uuid())
        .bind(followup.owner_id().as_uuid())
        .bind(followup.client_name().as_str())
        .bind(followup.client_email().as_str())
        .bind(followup.client_phone().map(ClientPhone::as_str))
        .bind(followup.subject().as_str())
        .bind(followup.message().map(FollowUpMessage::as_str))
        .bind(followup.follow_up_date())
        .bind(followup.follow_up_time())
        .bind(followup.next_due_at())
        .bind(followup.attempt_count() as i32)
        .bind(followup.max_attempts().as_i32())
        .bind(followup.is_replied())
        .bind(followup.replied_at())
        .bind(followup.exhausted_at())
        .bind(followup.last_contacted_at())
        .bind(status)
        .bind(followup.version().as_i32())
        .bind(followup.created_at())
        .bind(followup.updated_at())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id, %owner_id))]
    async fn find_by_id(
        &self,
        id: &FollowUpId,
        owner_id: &UserId,
    ) -> Result<Option<FollowUp>, InfraError> {
        let row = sqlx::query_as::<_, FollowUpRow>(&format!(
            "{SELECT_COLUMNS} WHERE id = $1 AND owner_id = $2"
        ))
        .bind(id.as_uuid())
        .bind(owner_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(FollowUp::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id))]
    async fn find_by_id_unscoped(&self, id: &FollowUpId) -> Result<Option<FollowUp>, InfraError> {
        let row = sqlx::query_as::<_, FollowUpRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        row.map(FollowUp::try_from).transpose()
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%owner_id))]
    async fn find_by_owner(&self, owner_id: &UserId) -> Result<Vec<FollowUp>, InfraError> {
        let rows = sqlx::query_as::<_, FollowUpRow>(&format!(
            "{SELECT_COLUMNS} WHERE owner_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(owner_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        into_followups(rows)
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%now))]
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<FollowUp>, InfraError> {
        let rows = sqlx::query_as::<_, FollowUpRow>(&format!(
            r#"{SELECT_COLUMNS}
            WHERE (next_due_at IS NULL OR next_due_at <= $1)
              AND replied = FALSE
              AND attempt_count < max_attempts
              AND status NOT IN ('completed', 'cancelled')
            ORDER BY next_due_at ASC NULLS FIRST, id ASC
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(into_followups_skipping_invalid(rows))
    }

    #[tracing::instrument(
        skip_all,
        level = "debug",
        fields(id = %followup.id(), %expected_version)
    )]
    async fn update_with_version_check(
        &self,
        followup: &FollowUp,
        expected_version: Version,
    ) -> Result<(), InfraError> {
        let status: &str = followup.status().into();
        let result = sqlx::query(
            r#"
            UPDATE follow_ups SET
                client_name = $1,
                client_email = $2,
                client_phone = $3,
                subject = $4,
                message = $5,
                follow_up_date = $6,
                follow_up_time = $7,
                next_due_at = $8,
                attempt_count = $9,
                max_attempts = $10,
                replied = $11,
                replied_at = $12,
                exhausted_at = $13,
                last_contacted_at = $14,
                status = $15,
                version = $16,
                updated_at = $17
            WHERE id = $18 AND version = $19
            "#,
        )
        .bind(followup.client_name().as_str())
        .bind(followup.client_email().as_str())
        .bind(followup.client_phone().map(ClientPhone::as_str))
        .bind(followup.subject().as_str())
        .bind(followup.message().map(FollowUpMessage::as_str))
        .bind(followup.follow_up_date())
        .bind(followup.follow_up_time())
        .bind(followup.next_due_at())
        .bind(followup.attempt_count() as i32)
        .bind(followup.max_attempts().as_i32())
        .bind(followup.is_replied())
        .bind(followup.replied_at())
        .bind(followup.exhausted_at())
        .bind(followup.last_contacted_at())
        .bind(status)
        .bind(followup.version().as_i32())
        .bind(followup.updated_at())
        .bind(followup.id().as_uuid())
        .bind(expected_version.as_i32())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(InfraError::conflict(
                "FollowUp",
                followup.id().as_uuid().to_string(),
            ));
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, level = "debug", fields(%id, %owner_id))]
    async fn delete(&self, id: &FollowUpId, owner_id: &UserId) -> Result<bool, InfraError> {
        let result = sqlx::query("DELETE FROM follow_ups WHERE id = $1 AND owner_id = $2")
            .bind(id.as_uuid())
            .bind(owner_id.as_uuid())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PostgresFollowUpRepository>();
    }

    fn row() -> FollowUpRow {
        let now = Utc::now();
        FollowUpRow {
            id: Uuid::now_v7(),
            owner_id: Uuid::now_v7(),
            client_name: "田中太郎".to_string(),
            client_email: "tanaka@example.com".to_string(),
            client_phone: None,
            subject: "ご提案の件について".to_string(),
            message: Some(String::new()),
            follow_up_date: None,
            follow_up_time: None,
            next_due_at: None,
            attempt_count: 0,
            max_attempts: 3,
            replied: false,
            replied_at: None,
            exhausted_at: None,
            last_contacted_at: None,
            status: "pending".to_string(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn 行からフォローアップに変換できる() {
        let followup = FollowUp::try_from(row()).unwrap();

        assert_eq!(followup.status(), FollowUpStatus::Pending);
        assert_eq!(followup.message(), None);
        assert_eq!(followup.max_attempts().as_u32(), 3);
    }

    #[test]
    fn 不正なステータスの行は変換エラーになる() {
        let result = FollowUp::try_from(FollowUpRow {
            status: "archived".to_string(),
            ..row()
        });
        assert!(result.is_err());
    }

    #[test]
    fn 送信対象の走査では変換できない行だけを除外する() {
        let first = row();
        let broken = FollowUpRow {
            subject: "abc".to_string(),
            ..row()
        };
        let third = row();
        let expected_ids = vec![first.id, third.id];

        let followups = into_followups_skipping_invalid(vec![first, broken, third]);

        let ids: Vec<Uuid> = followups.iter().map(|f| *f.id().as_uuid()).collect();
        assert_eq!(ids, expected_ids);
    }

    #[test]
    fn 一覧の変換は変換できない行があればエラーになる() {
        let broken = FollowUpRow {
            subject: "abc".to_string(),
            ..row()
        };

        assert!(into_followups(vec![row(), broken]).is_err());
    }

    #[test]
    fn 負の送信回数の行は変換エラーになる() {
        let result = FollowUp::try_from(FollowUpRow {
            attempt_count: -1,
            ..row()
        });
        assert!(result.is_err());
    }
}
