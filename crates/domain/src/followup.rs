//! # フォローアップ
//!
//! 顧客への再連絡リマインダー。所有者（ユーザー）ごとに管理され、
//! スケジューラが期日を迎えたものにメールを送り、送信回数と次回期日を進める。
//!
//! ## 2 つの状態軸
//!
//! - [`FollowUpStatus`]: ユーザーが操作する粗いラベル（pending / completed / cancelled）
//! - [`FollowUpState`]: スケジューラが進める送信状態（Scheduled / Exhausted / Replied）
//!
//! 送信状態は ADT で表現し、各状態で有効なフィールドのみを持たせる。
//!
//! ```text
//! Scheduled ──(送信成功, 回数 < 上限)──▶ Scheduled
//!     │
//!     ├──(送信成功, 回数 == 上限)──▶ Exhausted
//!     │                                  │
//!     └──────(mark_replied)──────▶ Replied ◀──(mark_replied)
//! ```
//!
//! 送信失敗時は何も変えない（同じ試行を次回のパスで再送する）。
//! Exhausted と Replied は終端で、以後スケジューリング対象にならない。
//!
//! ## 楽観的ロック
//!
//! すべての遷移は `version` をインクリメントする。永続化は
//! `version` を条件にした UPDATE 経由でのみ行う。

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    schedule::DelayTable,
    user::UserId,
    value_objects::{ClientName, Email, FollowUpMessage, MaxAttempts, Subject, Version},
};

define_uuid_id! {
    /// フォローアップ ID
    pub struct FollowUpId;
}

define_validated_string! {
    /// 顧客の電話番号（任意項目）
    pub struct ClientPhone {
        label: "電話番号",
        min_length: 3,
        max_length: 30,
    }
}

/// フォローアップステータス（ユーザー向けラベル）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum FollowUpStatus {
    /// 対応中
    Pending,
    /// 完了
    Completed,
    /// 取り消し
    Cancelled,
}

impl FollowUpStatus {
    /// スケジューリング対象になり得るステータスか
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

impl std::str::FromStr for FollowUpStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(DomainError::Validation(format!(
                "不正なフォローアップステータス: {}",
                s
            ))),
        }
    }
}

/// 送信状態の種別
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SchedulingState {
    Scheduled,
    Exhausted,
    Replied,
}

/// フォローアップの送信状態（ADT ベースステートマシン）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FollowUpState {
    /// 次回送信待ち
    Scheduled(ScheduledState),
    /// 上限回数に到達（終端）
    Exhausted(ExhaustedState),
    /// 顧客が返信済み（終端）
    Replied(RepliedState),
}

/// Scheduled 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledState {
    /// 次回送信予定日時（`None` は即時送信対象）
    pub next_due_at: Option<DateTime<Utc>>,
}

/// Exhausted 状態の固有フィールド
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExhaustedState {
    pub exhausted_at: DateTime<Utc>,
}

/// Replied 状態の固有フィールド
///
/// Exhausted から遷移した場合は `exhausted_at` を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepliedState {
    pub replied_at:   DateTime<Utc>,
    pub exhausted_at: Option<DateTime<Utc>>,
}

/// フォローアップエンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowUp {
    id: FollowUpId,
    owner_id: UserId,
    client_name: ClientName,
    client_email: Email,
    client_phone: Option<ClientPhone>,
    subject: Subject,
    message: Option<FollowUpMessage>,
    follow_up_date: Option<NaiveDate>,
    follow_up_time: Option<NaiveTime>,
    attempt_count: u32,
    max_attempts: MaxAttempts,
    status: FollowUpStatus,
    last_contacted_at: Option<DateTime<Utc>>,
    version: Version,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    state: FollowUpState,
}

/// フォローアップの新規作成パラメータ
pub struct NewFollowUp {
    pub id: FollowUpId,
    pub owner_id: UserId,
    pub client_name: ClientName,
    pub client_email: Email,
    pub client_phone: Option<ClientPhone>,
    pub subject: Subject,
    pub message: Option<FollowUpMessage>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_time: Option<NaiveTime>,
    pub max_attempts: MaxAttempts,
    pub now: DateTime<Utc>,
}

/// フォローアップの DB 復元パラメータ
///
/// DB スキーマのフラット構造を表現する。`from_db()` で不変条件を検証して ADT に変換する。
pub struct FollowUpRecord {
    pub id: FollowUpId,
    pub owner_id: UserId,
    pub client_name: ClientName,
    pub client_email: Email,
    pub client_phone: Option<ClientPhone>,
    pub subject: Subject,
    pub message: Option<FollowUpMessage>,
    pub follow_up_date: Option<NaiveDate>,
    pub follow_up_time: Option<NaiveTime>,
    pub next_due_at: Option<DateTime<Utc>>,
    pub attempt_count: u32,
    pub max_attempts: MaxAttempts,
    pub replied: bool,
    pub replied_at: Option<DateTime<Utc>>,
    pub exhausted_at: Option<DateTime<Utc>>,
    pub last_contacted_at: Option<DateTime<Utc>>,
    pub status: FollowUpStatus,
    pub version: Version,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 期日（日付 + 時刻）から次回送信予定日時を求める
///
/// 時刻未指定なら 00:00、日付未指定なら `None`（即時）。タイムゾーンは UTC。
pub fn initial_due_at(date: Option<NaiveDate>, time: Option<NaiveTime>) -> Option<DateTime<Utc>> {
    date.map(|d| d.and_time(time.unwrap_or(NaiveTime::MIN)).and_utc())
}

impl FollowUp {
    /// 新しいフォローアップを作成する
    ///
    /// 初期状態は送信回数 0、ステータス pending、Scheduled。
    pub fn new(params: NewFollowUp) -> Self {
        let next_due_at = initial_due_at(params.follow_up_date, params.follow_up_time);
        Self {
            id: params.id,
            owner_id: params.owner_id,
            client_name: params.client_name,
            client_email: params.client_email,
            client_phone: params.client_phone,
            subject: params.subject,
            message: params.message,
            follow_up_date: params.follow_up_date,
            follow_up_time: params.follow_up_time,
            attempt_count: 0,
            max_attempts: params.max_attempts,
            status: FollowUpStatus::Pending,
            last_contacted_at: None,
            version: Version::initial(),
            created_at: params.now,
            updated_at: params.now,
            state: FollowUpState::Scheduled(ScheduledState { next_due_at }),
        }
    }

    /// 既存のデータから復元する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 不変条件違反
    ///   （送信回数が上限超過、replied なのに replied_at がない、
    ///   上限到達なのに次回期日がある、など）
    pub fn from_db(record: FollowUpRecord) -> Result<Self, DomainError> {
        let max = record.max_attempts.as_u32();
        if record.attempt_count > max {
            return Err(DomainError::Validation(format!(
                "送信回数 {} が上限 {} を超えています",
                record.attempt_count, max
            )));
        }

        let state = if record.replied {
            let replied_at = record.replied_at.ok_or_else(|| {
                DomainError::Validation(
                    "返信済みのフォローアップには replied_at が必要です".to_string(),
                )
            })?;
            FollowUpState::Replied(RepliedState {
                replied_at,
                exhausted_at: record.exhausted_at,
            })
        } else if record.attempt_count == max {
            if record.next_due_at.is_some() {
                return Err(DomainError::Validation(
                    "上限到達済みのフォローアップに次回期日は設定できません".to_string(),
                ));
            }
            let exhausted_at = record.exhausted_at.ok_or_else(|| {
                DomainError::Validation(
                    "上限到達済みのフォローアップには exhausted_at が必要です".to_string(),
                )
            })?;
            FollowUpState::Exhausted(ExhaustedState { exhausted_at })
        } else {
            if record.exhausted_at.is_some() {
                return Err(DomainError::Validation(
                    "上限未到達のフォローアップに exhausted_at は設定できません".to_string(),
                ));
            }
            FollowUpState::Scheduled(ScheduledState {
                next_due_at: record.next_due_at,
            })
        };

        Ok(Self {
            id: record.id,
            owner_id: record.owner_id,
            client_name: record.client_name,
            client_email: record.client_email,
            client_phone: record.client_phone,
            subject: record.subject,
            message: record.message,
            follow_up_date: record.follow_up_date,
            follow_up_time: record.follow_up_time,
            attempt_count: record.attempt_count,
            max_attempts: record.max_attempts,
            status: record.status,
            last_contacted_at: record.last_contacted_at,
            version: record.version,
            created_at: record.created_at,
            updated_at: record.updated_at,
            state,
        })
    }

    // Getter メソッド

    pub fn id(&self) -> &FollowUpId {
        &self.id
    }

    pub fn owner_id(&self) -> &UserId {
        &self.owner_id
    }

    pub fn client_name(&self) -> &ClientName {
        &self.client_name
    }

    pub fn client_email(&self) -> &Email {
        &self.client_email
    }

    pub fn client_phone(&self) -> Option<&ClientPhone> {
        self.client_phone.as_ref()
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn message(&self) -> Option<&FollowUpMessage> {
        self.message.as_ref()
    }

    pub fn follow_up_date(&self) -> Option<NaiveDate> {
        self.follow_up_date
    }

    pub fn follow_up_time(&self) -> Option<NaiveTime> {
        self.follow_up_time
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> MaxAttempts {
        self.max_attempts
    }

    pub fn status(&self) -> FollowUpStatus {
        self.status
    }

    pub fn last_contacted_at(&self) -> Option<DateTime<Utc>> {
        self.last_contacted_at
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 状態への直接アクセス（パターンマッチ用）
    pub fn state(&self) -> &FollowUpState {
        &self.state
    }

    pub fn scheduling_state(&self) -> SchedulingState {
        match &self.state {
            FollowUpState::Scheduled(_) => SchedulingState::Scheduled,
            FollowUpState::Exhausted(_) => SchedulingState::Exhausted,
            FollowUpState::Replied(_) => SchedulingState::Replied,
        }
    }

    pub fn next_due_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            FollowUpState::Scheduled(s) => s.next_due_at,
            FollowUpState::Exhausted(_) | FollowUpState::Replied(_) => None,
        }
    }

    pub fn is_replied(&self) -> bool {
        matches!(self.state, FollowUpState::Replied(_))
    }

    pub fn replied_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            FollowUpState::Replied(s) => Some(s.replied_at),
            _ => None,
        }
    }

    pub fn exhausted_at(&self) -> Option<DateTime<Utc>> {
        match &self.state {
            FollowUpState::Exhausted(s) => Some(s.exhausted_at),
            FollowUpState::Replied(s) => s.exhausted_at,
            FollowUpState::Scheduled(_) => None,
        }
    }

    /// 次に送る試行のインデックス（0 始まり）
    ///
    /// テンプレート選択に使う。
    pub fn next_attempt_index(&self) -> usize {
        self.attempt_count as usize
    }

    // ビジネスロジックメソッド

    /// 指定時刻に送信対象かを判定する
    ///
    /// 返信済みであれば他の条件に関わらず対象外。
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let FollowUpState::Scheduled(scheduled) = &self.state else {
            return false;
        };
        self.status.is_active()
            && self.attempt_count < self.max_attempts.as_u32()
            && scheduled.next_due_at.is_none_or(|due| due <= now)
    }

    /// 送信成功を記録した新しいフォローアップを返す
    ///
    /// 送信回数を 1 増やし、上限に達したら Exhausted に遷移する。
    /// 上限未満なら `now + 待機日数` を次回期日とする。
    ///
    /// # Errors
    ///
    /// Scheduled 以外、またはステータスが pending 以外の場合は
    /// `DomainError::Validation` を返す。
    pub fn record_successful_send(
        self,
        now: DateTime<Utc>,
        delays: &DelayTable,
    ) -> Result<Self, DomainError> {
        if !matches!(self.state, FollowUpState::Scheduled(_)) {
            return Err(DomainError::Validation(format!(
                "{} 状態のフォローアップには送信できません",
                self.scheduling_state()
            )));
        }
        if !self.status.is_active() {
            return Err(DomainError::Validation(format!(
                "ステータスが {} のフォローアップには送信できません",
                self.status
            )));
        }
        let max = self.max_attempts.as_u32();
        if self.attempt_count >= max {
            return Err(DomainError::Validation(
                "送信回数が上限に達しています".to_string(),
            ));
        }

        let attempt_count = self.attempt_count + 1;
        let state = if attempt_count == max {
            FollowUpState::Exhausted(ExhaustedState { exhausted_at: now })
        } else {
            FollowUpState::Scheduled(ScheduledState {
                next_due_at: Some(now + delays.delay_after(attempt_count)),
            })
        };

        Ok(Self {
            attempt_count,
            last_contacted_at: Some(now),
            version: self.version.next(),
            updated_at: now,
            state,
            ..self
        })
    }

    /// 返信済みにした新しいフォローアップを返す
    ///
    /// 既に Replied の場合は何も変えずにそのまま返す。
    pub fn mark_replied(self, now: DateTime<Utc>) -> Self {
        let exhausted_at = match &self.state {
            FollowUpState::Replied(_) => return self,
            FollowUpState::Exhausted(s) => Some(s.exhausted_at),
            FollowUpState::Scheduled(_) => None,
        };
        Self {
            version: self.version.next(),
            updated_at: now,
            state: FollowUpState::Replied(RepliedState {
                replied_at: now,
                exhausted_at,
            }),
            ..self
        }
    }

    /// ステータスを変更した新しいフォローアップを返す
    ///
    /// ステータスは送信状態とは独立しており、どの組み合わせにも変更できる。
    pub fn with_status(self, status: FollowUpStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            version: self.version.next(),
            updated_at: now,
            ..self
        }
    }

    /// 期日を変更した新しいフォローアップを返す
    ///
    /// # Errors
    ///
    /// 終端状態（Exhausted / Replied）の場合は `DomainError::Validation` を返す。
    pub fn rescheduled(
        self,
        date: NaiveDate,
        time: Option<NaiveTime>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if !matches!(self.state, FollowUpState::Scheduled(_)) {
            return Err(DomainError::Validation(format!(
                "{} 状態のフォローアップは期日を変更できません",
                self.scheduling_state()
            )));
        }
        Ok(Self {
            follow_up_date: Some(date),
            follow_up_time: time,
            version: self.version.next(),
            updated_at: now,
            state: FollowUpState::Scheduled(ScheduledState {
                next_due_at: initial_due_at(Some(date), time),
            }),
            ..self
        })
    }
}
