//! # スケジューリングパス
//!
//! 期日を迎えたフォローアップを走査し、1 件ずつ独立に次の処理を行う:
//!
//! ```text
//! テンプレート選択 → プレースホルダ置換 → メール組み立て → 送信
//!   → 成功: 送信回数を進めてバージョンチェック付きで保存
//!   → 失敗: 状態は変更せず、ログに残して次回のパスで再試行
//! ```
//!
//! ## 失敗の隔離
//!
//! 1 件の失敗（テンプレートなし・送信失敗・保存失敗）は [`PassItemError`] として
//! ログに記録され、パス全体を止めない。呼び出し元には件数の集計
//! （[`PassSummary`]）だけを返す。
//!
//! ## 競合時の扱い
//!
//! 送信後の保存がバージョン競合になった場合は、最新の状態を再取得する。
//! 同じ試行のまま送信対象であれば 1 回だけ遷移を再適用し、
//! 返信済み・取り消し・他の書き手による更新があれば何も書き込まない。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use followupmate_domain::{
    followup::{FollowUp, FollowUpId, SchedulingState},
    schedule::DelayTable,
    template::{MessageTemplate, select_template},
};
use followupmate_infra::{
    InfraError,
    repository::{FollowUpRepository, MessageTemplateRepository, UserRepository},
};
use followupmate_shared::{event_log::event, log_business_event};
use futures::{StreamExt as _, stream};
use serde::Serialize;

use crate::{
    error::PassItemError,
    usecase::notification::{
        DeliveryAdapter,
        PlaceholderValues,
        Sender,
        TemplateRenderer,
        render,
    },
};

/// 1 回のパスの集計結果
///
/// `due = sent + failed + superseded` が常に成り立つ。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// 走査で見つかった送信対象の件数
    pub due:        usize,
    /// 送信して状態の前進を保存できた件数
    pub sent:       usize,
    /// 状態を前進できなかった件数（テンプレートなし・送信失敗・保存失敗・競合未解消）
    pub failed:     usize,
    /// `sent` のうち、この送信で上限に達した件数
    pub exhausted:  usize,
    /// 送信後に返信・取り消しなど他の更新が先に保存されていた件数
    pub superseded: usize,
}

/// 1 件分の処理結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Advanced { exhausted: bool },
    Superseded,
}

/// スケジューリングパス
///
/// ストレージ・送信・時刻はすべて注入され、パス自体は状態を持たない。
pub struct SchedulingPass {
    followups:   Arc<dyn FollowUpRepository>,
    templates:   Arc<dyn MessageTemplateRepository>,
    users:       Arc<dyn UserRepository>,
    renderer:    TemplateRenderer,
    delivery:    DeliveryAdapter,
    delays:      DelayTable,
    concurrency: usize,
}

impl SchedulingPass {
    pub fn new(
        followups: Arc<dyn FollowUpRepository>,
        templates: Arc<dyn MessageTemplateRepository>,
        users: Arc<dyn UserRepository>,
        renderer: TemplateRenderer,
        delivery: DeliveryAdapter,
        delays: DelayTable,
    ) -> Self {
        Self {
            followups,
            templates,
            users,
            renderer,
            delivery,
            delays,
            concurrency: 1,
        }
    }

    /// パス内で同時に処理する件数を設定する（最低 1）
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// スケジューリングパスを 1 回実行する
    ///
    /// # Errors
    ///
    /// 送信対象の走査自体に失敗した場合のみエラーを返す。
    /// 個々のフォローアップの失敗は集計に含めて `Ok` を返す。
    #[tracing::instrument(name = "scheduling_pass", skip_all, fields(now = %now))]
    pub async fn run(&self, now: DateTime<Utc>) -> Result<PassSummary, InfraError> {
        let due = self.followups.find_due(now).await?;
        let mut summary = PassSummary {
            due: due.len(),
            ..PassSummary::default()
        };

        let results: Vec<_> = stream::iter(due)
            .map(|followup| async move {
                let id = followup.id().clone();
                (id, self.process(followup, now).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (followup_id, result) in results {
            match result {
                Ok(ItemOutcome::Advanced { exhausted }) => {
                    summary.sent += 1;
                    if exhausted {
                        summary.exhausted += 1;
                    }
                }
                Ok(ItemOutcome::Superseded) => {
                    tracing::info!(
                        followup_id = %followup_id,
                        "送信後に他の更新が保存されていたため状態を前進しませんでした"
                    );
                    summary.superseded += 1;
                }
                Err(e) => {
                    let (category, kind) = e.log_fields();
                    tracing::warn!(
                        error.category = category,
                        error.kind = kind,
                        followup_id = %followup_id,
                        error = %e,
                        "フォローアップの処理に失敗（次回のパスで再試行）"
                    );
                    summary.failed += 1;
                }
            }
        }

        let result = if summary.failed == 0 {
            event::result::SUCCESS
        } else {
            event::result::FAILURE
        };
        log_business_event!(
            event.category = event::category::SCHEDULER,
            event.action = event::action::PASS_COMPLETED,
            event.entity_type = event::entity_type::SCHEDULING_PASS,
            event.result = result,
            pass.due = summary.due,
            pass.sent = summary.sent,
            pass.failed = summary.failed,
            pass.exhausted = summary.exhausted,
            pass.superseded = summary.superseded,
            "スケジューリングパス完了"
        );

        Ok(summary)
    }

    async fn process(
        &self,
        followup: FollowUp,
        now: DateTime<Utc>,
    ) -> Result<ItemOutcome, PassItemError> {
        let templates = self.templates_for(&followup).await?;
        let template = select_template(&templates, followup.next_attempt_index())?;

        let owner = self
            .users
            .find_by_id(followup.owner_id())
            .await
            .map_err(PassItemError::Storage)?;
        if owner.is_none() {
            tracing::debug!(
                followup_id = %followup.id(),
                owner_id = %followup.owner_id(),
                "所有者が見つからないため送信者情報なしで送信します"
            );
        }

        let values = PlaceholderValues::for_followup(&followup, owner.as_ref());
        let rendered = render(template, &values);
        let sender = owner.as_ref().map(Sender::from).unwrap_or_default();
        let email = self
            .renderer
            .compose(followup.client_email().as_str(), &rendered, &sender)?;

        self.delivery.send(&followup, &email).await?;

        self.advance(followup, now).await
    }

    /// 所有者のテンプレート、無ければシステム既定テンプレートを返す
    async fn templates_for(
        &self,
        followup: &FollowUp,
    ) -> Result<Vec<MessageTemplate>, PassItemError> {
        let owned = self
            .templates
            .find_by_owner(followup.owner_id())
            .await
            .map_err(PassItemError::Storage)?;
        if !owned.is_empty() {
            return Ok(owned);
        }
        self.templates
            .find_system_defaults()
            .await
            .map_err(PassItemError::Storage)
    }

    /// 送信成功を記録して保存する
    async fn advance(
        &self,
        followup: FollowUp,
        now: DateTime<Utc>,
    ) -> Result<ItemOutcome, PassItemError> {
        let expected = followup.version();
        let attempt_count = followup.attempt_count();
        let id = followup.id().clone();
        let updated = followup.record_successful_send(now, &self.delays)?;

        match self
            .followups
            .update_with_version_check(&updated, expected)
            .await
        {
            Ok(()) => Ok(advanced(&updated)),
            Err(e) if e.is_conflict() => {
                tracing::debug!(followup_id = %id, "保存時に競合、最新の状態で再適用します");
                self.reapply(&id, attempt_count, now).await
            }
            Err(e) => Err(PassItemError::Storage(e)),
        }
    }

    /// 競合後に最新の状態を読み直し、同じ試行のままなら 1 回だけ再適用する
    async fn reapply(
        &self,
        id: &FollowUpId,
        attempt_count: u32,
        now: DateTime<Utc>,
    ) -> Result<ItemOutcome, PassItemError> {
        let Some(current) = self
            .followups
            .find_by_id_unscoped(id)
            .await
            .map_err(PassItemError::Storage)?
        else {
            return Ok(ItemOutcome::Superseded);
        };

        if !current.is_due(now) || current.attempt_count() != attempt_count {
            return Ok(ItemOutcome::Superseded);
        }

        let expected = current.version();
        let updated = current.record_successful_send(now, &self.delays)?;
        self.followups
            .update_with_version_check(&updated, expected)
            .await?;
        Ok(advanced(&updated))
    }
}

fn advanced(updated: &FollowUp) -> ItemOutcome {
    ItemOutcome::Advanced {
        exhausted: updated.scheduling_state() == SchedulingState::Exhausted,
    }
}
