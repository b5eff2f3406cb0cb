//! # フォローアップユースケース
//!
//! 内部 API から呼ばれるフォローアップのコマンドを実装する。
//!
//! ## 更新経路
//!
//! 変更はすべて `update_with_version_check` を経由する。スケジューラと同じ
//! 読み取り → 変更 → バージョンチェック付き保存の経路を通るため、送信回数の
//! 更新が上書きで失われることはない。競合した場合は最新の状態で 1 回だけ再試行し、
//! それでも競合すれば [`CoreError::Conflict`] を返す。

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use followupmate_domain::{
    clock::Clock,
    followup::{ClientPhone, FollowUp, FollowUpId, FollowUpStatus, NewFollowUp},
    schedule::FollowUpPolicy,
    user::UserId,
    value_objects::{ClientName, Email, FollowUpMessage, MaxAttempts, Subject},
};
use followupmate_infra::repository::FollowUpRepository;
use followupmate_shared::{event_log::event, log_business_event};

use crate::error::CoreError;

/// 競合時に最新の状態で再試行する回数
const CONFLICT_RETRIES: usize = 1;

/// フォローアップ作成入力（未検証）
#[derive(Debug, Clone, Default)]
pub struct CreateFollowUpInput {
    pub client_name:    String,
    pub client_email:   String,
    pub client_phone:   Option<String>,
    pub subject:        String,
    pub message:        Option<String>,
    pub follow_up_date: Option<NaiveDate>,
    /// `HH:MM`（24 時間表記）
    pub follow_up_time: Option<String>,
    /// 未指定なら設定の既定値
    pub max_attempts:   Option<u32>,
}

/// `HH:MM`（24 時間表記）の時刻をパースする
pub fn parse_time(value: &str) -> Result<NaiveTime, CoreError> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M").map_err(|_| {
        CoreError::BadRequest(format!(
            "時刻は HH:MM（24 時間表記）で指定してください: {value}"
        ))
    })
}

fn parse_optional_time(value: Option<&str>) -> Result<Option<NaiveTime>, CoreError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(parse_time)
        .transpose()
}

/// フォローアップユースケース
pub struct FollowUpUseCase {
    repo:   Arc<dyn FollowUpRepository>,
    clock:  Arc<dyn Clock>,
    policy: FollowUpPolicy,
}

impl FollowUpUseCase {
    pub fn new(
        repo: Arc<dyn FollowUpRepository>,
        clock: Arc<dyn Clock>,
        policy: FollowUpPolicy,
    ) -> Self {
        Self {
            repo,
            clock,
            policy,
        }
    }

    /// フォローアップを作成する
    ///
    /// 入力はここで検証し、不正なものはスケジューリングの対象に入らない。
    pub async fn create(
        &self,
        owner_id: UserId,
        input: CreateFollowUpInput,
    ) -> Result<FollowUp, CoreError> {
        let max_attempts = match input.max_attempts {
            Some(n) => MaxAttempts::new(n)?,
            None => self.policy.default_max_attempts,
        };
        let client_phone = input
            .client_phone
            .filter(|p| !p.trim().is_empty())
            .map(ClientPhone::new)
            .transpose()?;

        let followup = FollowUp::new(NewFollowUp {
            id: FollowUpId::new(),
            owner_id,
            client_name: ClientName::new(input.client_name)?,
            client_email: Email::new(input.client_email)?,
            client_phone,
            subject: Subject::new(input.subject)?,
            message: FollowUpMessage::parse_optional(input.message)?,
            follow_up_date: input.follow_up_date,
            follow_up_time: parse_optional_time(input.follow_up_time.as_deref())?,
            max_attempts,
            now: self.clock.now(),
        });

        self.repo.insert(&followup).await?;

        log_business_event!(
            event.category = event::category::FOLLOWUP,
            event.action = event::action::FOLLOWUP_CREATED,
            event.entity_type = event::entity_type::FOLLOWUP,
            event.entity_id = %followup.id(),
            event.actor_id = %followup.owner_id(),
            event.result = event::result::SUCCESS,
            "フォローアップ作成"
        );

        Ok(followup)
    }

    /// 所有者のフォローアップ一覧（作成日時の新しい順）
    pub async fn list(&self, owner_id: &UserId) -> Result<Vec<FollowUp>, CoreError> {
        Ok(self.repo.find_by_owner(owner_id).await?)
    }

    /// ステータス（pending / completed / cancelled）を変更する
    pub async fn update_status(
        &self,
        id: &FollowUpId,
        owner_id: &UserId,
        status: FollowUpStatus,
    ) -> Result<FollowUp, CoreError> {
        let now = self.clock.now();
        let updated = self
            .modify(id, owner_id, |f| Ok(f.with_status(status, now)))
            .await?;

        log_business_event!(
            event.category = event::category::FOLLOWUP,
            event.action = event::action::FOLLOWUP_STATUS_CHANGED,
            event.entity_type = event::entity_type::FOLLOWUP,
            event.entity_id = %id,
            event.actor_id = %owner_id,
            event.result = event::result::SUCCESS,
            followup.status = %status,
            "フォローアップのステータス変更"
        );

        Ok(updated)
    }

    /// 期日を変更する
    pub async fn reschedule(
        &self,
        id: &FollowUpId,
        owner_id: &UserId,
        date: NaiveDate,
        time: Option<&str>,
    ) -> Result<FollowUp, CoreError> {
        let time = parse_optional_time(time)?;
        let now = self.clock.now();
        let updated = self
            .modify(id, owner_id, |f| Ok(f.rescheduled(date, time, now)?))
            .await?;

        log_business_event!(
            event.category = event::category::FOLLOWUP,
            event.action = event::action::FOLLOWUP_RESCHEDULED,
            event.entity_type = event::entity_type::FOLLOWUP,
            event.entity_id = %id,
            event.actor_id = %owner_id,
            event.result = event::result::SUCCESS,
            "フォローアップの期日変更"
        );

        Ok(updated)
    }

    /// 顧客から返信があったことを記録する
    ///
    /// 以後このフォローアップは送信対象にならない。既に返信済みなら何もしない。
    pub async fn mark_replied(
        &self,
        id: &FollowUpId,
        owner_id: &UserId,
    ) -> Result<FollowUp, CoreError> {
        let now = self.clock.now();
        let updated = self
            .modify(id, owner_id, |f| Ok(f.mark_replied(now)))
            .await?;

        log_business_event!(
            event.category = event::category::FOLLOWUP,
            event.action = event::action::FOLLOWUP_REPLIED,
            event.entity_type = event::entity_type::FOLLOWUP,
            event.entity_id = %id,
            event.actor_id = %owner_id,
            event.result = event::result::SUCCESS,
            "フォローアップ返信済み"
        );

        Ok(updated)
    }

    /// フォローアップを削除する
    pub async fn delete(&self, id: &FollowUpId, owner_id: &UserId) -> Result<(), CoreError> {
        if !self.repo.delete(id, owner_id).await? {
            return Err(not_found(id));
        }

        log_business_event!(
            event.category = event::category::FOLLOWUP,
            event.action = event::action::FOLLOWUP_DELETED,
            event.entity_type = event::entity_type::FOLLOWUP,
            event.entity_id = %id,
            event.actor_id = %owner_id,
            event.result = event::result::SUCCESS,
            "フォローアップ削除"
        );

        Ok(())
    }

    /// 読み取り → 変更 → バージョンチェック付き保存
    ///
    /// 変更が無ければ保存しない。競合時は最新の状態で再試行する。
    async fn modify<F>(
        &self,
        id: &FollowUpId,
        owner_id: &UserId,
        change: F,
    ) -> Result<FollowUp, CoreError>
    where
        F: Fn(FollowUp) -> Result<FollowUp, CoreError>,
    {
        let mut retries = 0;
        loop {
            let current = self
                .repo
                .find_by_id(id, owner_id)
                .await?
                .ok_or_else(|| not_found(id))?;
            let expected = current.version();
            let updated = change(current.clone())?;
            if updated == current {
                return Ok(updated);
            }

            match self.repo.update_with_version_check(&updated, expected).await {
                Ok(()) => return Ok(updated),
                Err(e) if e.is_conflict() && retries < CONFLICT_RETRIES => {
                    retries += 1;
                    tracing::debug!(followup_id = %id, "更新が競合したため再試行します");
                }
                Err(e) if e.is_conflict() => {
                    return Err(CoreError::Conflict(format!(
                        "フォローアップ（id={id}）は他の操作で更新されました"
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn not_found(id: &FollowUpId) -> CoreError {
    CoreError::NotFound(format!("フォローアップ（id={id}）"))
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, Utc};
    use followupmate_domain::{clock::FixedClock, followup::SchedulingState, schedule::DelayTable};
    use followupmate_infra::mock::MockFollowUpRepository;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn sut(repo: &MockFollowUpRepository, now: DateTime<Utc>) -> FollowUpUseCase {
        FollowUpUseCase::new(
            Arc::new(repo.clone()),
            Arc::new(FixedClock::new(now)),
            FollowUpPolicy::default(),
        )
    }

    fn input() -> CreateFollowUpInput {
        CreateFollowUpInput {
            client_name: "田中太郎".to_string(),
            client_email: "tanaka@example.com".to_string(),
            subject: "ご提案の件について".to_string(),
            follow_up_date: NaiveDate::from_ymd_opt(2025, 7, 1),
            follow_up_time: Some("09:30".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_作成したフォローアップは初期状態で保存される() {
        let now = now();
        let repo = MockFollowUpRepository::new();
        let owner = UserId::new();

        let created = sut(&repo, now).create(owner.clone(), input()).await.unwrap();

        assert_eq!(created.attempt_count(), 0);
        assert_eq!(created.status(), FollowUpStatus::Pending);
        assert_eq!(created.max_attempts(), MaxAttempts::DEFAULT);
        assert_eq!(
            created.next_due_at(),
            Some(
                NaiveDate::from_ymd_opt(2025, 7, 1)
                    .unwrap()
                    .and_hms_opt(9, 30, 0)
                    .unwrap()
                    .and_utc()
            )
        );
        assert_eq!(repo.get(created.id()), Some(created.clone()));
    }

    #[rstest]
    #[case(CreateFollowUpInput { client_name: "田".to_string(), ..input() })]
    #[case(CreateFollowUpInput { client_email: "not-an-email".to_string(), ..input() })]
    #[case(CreateFollowUpInput { subject: "短い".to_string(), ..input() })]
    #[case(CreateFollowUpInput { message: Some("あ".repeat(1001)), ..input() })]
    #[case(CreateFollowUpInput { follow_up_time: Some("25:00".to_string()), ..input() })]
    #[case(CreateFollowUpInput { follow_up_time: Some("9時".to_string()), ..input() })]
    #[case(CreateFollowUpInput { max_attempts: Some(0), ..input() })]
    #[case(CreateFollowUpInput { max_attempts: Some(3_000_000_000), ..input() })]
    #[tokio::test]
    async fn test_不正な入力はbad_requestで保存されない(#[case] input: CreateFollowUpInput) {
        let repo = MockFollowUpRepository::new();

        let result = sut(&repo, now()).create(UserId::new(), input).await;

        assert!(matches!(result, Err(CoreError::BadRequest(_))), "{result:?}");
        assert!(repo.all().is_empty());
    }

    #[tokio::test]
    async fn test_返信済みにすると送信対象から外れる() {
        let now = now();
        let repo = MockFollowUpRepository::new();
        let owner = UserId::new();
        let sut = sut(&repo, now);
        let created = sut.create(owner.clone(), input()).await.unwrap();

        let replied = sut.mark_replied(created.id(), &owner).await.unwrap();

        assert_eq!(replied.scheduling_state(), SchedulingState::Replied);
        assert!(!replied.is_due(now + Duration::days(365)));
        assert_eq!(repo.get(created.id()).unwrap().version(), created.version().next());
    }

    #[tokio::test]
    async fn test_返信済みを再度記録しても保存しない() {
        let now = now();
        let repo = MockFollowUpRepository::new();
        let owner = UserId::new();
        let sut = sut(&repo, now);
        let created = sut.create(owner.clone(), input()).await.unwrap();
        sut.mark_replied(created.id(), &owner).await.unwrap();

        let again = sut.mark_replied(created.id(), &owner).await.unwrap();

        assert_eq!(again.version(), created.version().next());
        assert_eq!(repo.update_calls(), 1);
    }

    #[tokio::test]
    async fn test_他の所有者のフォローアップは操作できない() {
        let now = now();
        let repo = MockFollowUpRepository::new();
        let sut = sut(&repo, now);
        let created = sut.create(UserId::new(), input()).await.unwrap();
        let stranger = UserId::new();

        let status = sut
            .update_status(created.id(), &stranger, FollowUpStatus::Completed)
            .await;
        let deleted = sut.delete(created.id(), &stranger).await;

        assert!(matches!(status, Err(CoreError::NotFound(_))));
        assert!(matches!(deleted, Err(CoreError::NotFound(_))));
        assert!(repo.get(created.id()).is_some());
    }

    #[tokio::test]
    async fn test_競合したら最新の状態で再試行する() {
        let now = now();
        let repo = MockFollowUpRepository::new();
        let owner = UserId::new();
        let sut = sut(&repo, now);
        let created = sut.create(owner.clone(), input()).await.unwrap();
        // ステータス変更の保存直前にスケジューラが送信を記録する
        repo.inject_concurrent_update(created.id(), move |f| {
            f.record_successful_send(now, &DelayTable::default()).unwrap()
        });

        let updated = sut
            .update_status(created.id(), &owner, FollowUpStatus::Completed)
            .await
            .unwrap();

        assert_eq!(updated.status(), FollowUpStatus::Completed);
        assert_eq!(updated.attempt_count(), 1);
        assert_eq!(repo.update_calls(), 2);
    }

    #[tokio::test]
    async fn test_再試行しても競合すればconflict() {
        let now = now();
        let repo = MockFollowUpRepository::new();
        let owner = UserId::new();
        let sut = sut(&repo, now);
        let created = sut.create(owner.clone(), input()).await.unwrap();
        for _ in 0..2 {
            repo.inject_concurrent_update(created.id(), move |f| {
                f.with_status(FollowUpStatus::Pending, now)
            });
        }

        let result = sut
            .update_status(created.id(), &owner, FollowUpStatus::Cancelled)
            .await;

        assert!(matches!(result, Err(CoreError::Conflict(_))));
        assert_eq!(repo.get(created.id()).unwrap().status(), FollowUpStatus::Pending);
    }

    #[tokio::test]
    async fn test_期日を変更すると次回期日が変わる() {
        let now = now();
        let repo = MockFollowUpRepository::new();
        let owner = UserId::new();
        let sut = sut(&repo, now);
        let created = sut.create(owner.clone(), input()).await.unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 8, 15).unwrap();

        let updated = sut
            .reschedule(created.id(), &owner, date, None)
            .await
            .unwrap();

        assert_eq!(
            updated.next_due_at(),
            Some(date.and_hms_opt(0, 0, 0).unwrap().and_utc())
        );
    }

    #[tokio::test]
    async fn test_返信済みの期日は変更できない() {
        let now = now();
        let repo = MockFollowUpRepository::new();
        let owner = UserId::new();
        let sut = sut(&repo, now);
        let created = sut.create(owner.clone(), input()).await.unwrap();
        sut.mark_replied(created.id(), &owner).await.unwrap();

        let result = sut
            .reschedule(created.id(), &owner, now.date_naive(), Some("10:00"))
            .await;

        assert!(matches!(result, Err(CoreError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_削除すると一覧から消える() {
        let now = now();
        let repo = MockFollowUpRepository::new();
        let owner = UserId::new();
        let sut = sut(&repo, now);
        let created = sut.create(owner.clone(), input()).await.unwrap();

        sut.delete(created.id(), &owner).await.unwrap();

        assert!(sut.list(&owner).await.unwrap().is_empty());
    }
}
