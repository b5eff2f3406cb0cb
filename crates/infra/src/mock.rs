//! # テスト用モック
//!
//! ユースケーステストで使用するインメモリのリポジトリと送信トランスポート。
//! `test-utils` feature を有効にすることで、他クレートからも利用可能。
//!
//! ```toml
//! [dev-dependencies]
//! followupmate-infra = { workspace = true, features = ["test-utils"] }
//! ```

use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use followupmate_domain::{
    followup::{FollowUp, FollowUpId},
    notification::{DeliveryError, EmailLog, EmailMessage, MessageId},
    template::{MessageTemplate, sort_templates},
    user::{User, UserId},
    value_objects::Version,
};

use crate::{
    error::InfraError,
    notification::NotificationSender,
    repository::{
        EmailLogRepository,
        FollowUpRepository,
        MessageTemplateRepository,
        UserRepository,
    },
};

// ===== MockFollowUpRepository =====

type ConcurrentUpdate = Box<dyn FnOnce(FollowUp) -> FollowUp + Send>;

/// インメモリのフォローアップリポジトリ
///
/// 競合の再現用に 2 つの注入手段を持つ:
/// - [`inject_concurrent_update`](Self::inject_concurrent_update):
///   次の更新の直前に、別の書き手による変更を保存済みデータへ適用する
/// - [`fail_updates_for`](Self::fail_updates_for): 更新を常にストレージエラーにする
#[derive(Clone, Default)]
pub struct MockFollowUpRepository {
    followups: Arc<Mutex<Vec<FollowUp>>>,
    concurrent_updates: Arc<Mutex<HashMap<FollowUpId, VecDeque<ConcurrentUpdate>>>>,
    failing_updates: Arc<Mutex<HashSet<FollowUpId>>>,
    update_calls: Arc<AtomicUsize>,
}

impl MockFollowUpRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_followup(&self, followup: FollowUp) {
        self.followups.lock().unwrap().push(followup);
    }

    /// 保存済みのフォローアップを取得する（検証用）
    pub fn get(&self, id: &FollowUpId) -> Option<FollowUp> {
        self.followups
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id() == id)
            .cloned()
    }

    pub fn all(&self) -> Vec<FollowUp> {
        self.followups.lock().unwrap().clone()
    }

    /// 次回の `update_with_version_check` の直前に割り込む変更を登録する
    ///
    /// 登録した順に 1 回ずつ消費される。
    pub fn inject_concurrent_update(
        &self,
        id: &FollowUpId,
        update: impl FnOnce(FollowUp) -> FollowUp + Send + 'static,
    ) {
        self.concurrent_updates
            .lock()
            .unwrap()
            .entry(id.clone())
            .or_default()
            .push_back(Box::new(update));
    }

    /// 指定したフォローアップの更新を常に失敗させる
    pub fn fail_updates_for(&self, id: &FollowUpId) {
        self.failing_updates.lock().unwrap().insert(id.clone());
    }

    /// `update_with_version_check` の呼び出し回数
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    fn apply_concurrent_update(&self, id: &FollowUpId) {
        let update = self
            .concurrent_updates
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(VecDeque::pop_front);
        let Some(update) = update else {
            return;
        };
        let mut followups = self.followups.lock().unwrap();
        if let Some(pos) = followups.iter().position(|f| f.id() == id) {
            let current = followups.remove(pos);
            followups.insert(pos, update(current));
        }
    }
}

#[async_trait]
impl FollowUpRepository for MockFollowUpRepository {
    async fn insert(&self, followup: &FollowUp) -> Result<(), InfraError> {
        self.followups.lock().unwrap().push(followup.clone());
        Ok(())
    }

    async fn find_by_id(
        &self,
        id: &FollowUpId,
        owner_id: &UserId,
    ) -> Result<Option<FollowUp>, InfraError> {
        Ok(self
            .followups
            .lock()
            .unwrap()
            .iter()
            .find(|f| f.id() == id && f.owner_id() == owner_id)
            .cloned())
    }

    async fn find_by_id_unscoped(&self, id: &FollowUpId) -> Result<Option<FollowUp>, InfraError> {
        Ok(self.get(id))
    }

    async fn find_by_owner(&self, owner_id: &UserId) -> Result<Vec<FollowUp>, InfraError> {
        let mut result: Vec<FollowUp> = self
            .followups
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.owner_id() == owner_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(a.id()))
        });
        Ok(result)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<FollowUp>, InfraError> {
        let mut due: Vec<FollowUp> = self
            .followups
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f.is_due(now))
            .cloned()
            .collect();
        // None（即時）が先頭に来る Option の順序は NULLS FIRST と一致する
        due.sort_by(|a, b| {
            a.next_due_at()
                .cmp(&b.next_due_at())
                .then_with(|| a.id().cmp(b.id()))
        });
        Ok(due)
    }

    async fn update_with_version_check(
        &self,
        followup: &FollowUp,
        expected_version: Version,
    ) -> Result<(), InfraError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);

        if self.failing_updates.lock().unwrap().contains(followup.id()) {
            return Err(InfraError::unexpected("注入されたストレージエラー"));
        }

        self.apply_concurrent_update(followup.id());

        let mut followups = self.followups.lock().unwrap();
        let stored = followups
            .iter_mut()
            .find(|f| f.id() == followup.id() && f.version() == expected_version);
        match stored {
            Some(slot) => {
                *slot = followup.clone();
                Ok(())
            }
            None => Err(InfraError::conflict(
                "FollowUp",
                followup.id().as_uuid().to_string(),
            )),
        }
    }

    async fn delete(&self, id: &FollowUpId, owner_id: &UserId) -> Result<bool, InfraError> {
        let mut followups = self.followups.lock().unwrap();
        let before = followups.len();
        followups.retain(|f| !(f.id() == id && f.owner_id() == owner_id));
        Ok(followups.len() < before)
    }
}

// ===== MockMessageTemplateRepository =====

#[derive(Clone, Default)]
pub struct MockMessageTemplateRepository {
    templates: Arc<Mutex<Vec<MessageTemplate>>>,
}

impl MockMessageTemplateRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_template(&self, template: MessageTemplate) {
        self.templates.lock().unwrap().push(template);
    }

    fn collect_sorted(&self, filter: impl Fn(&MessageTemplate) -> bool) -> Vec<MessageTemplate> {
        let mut result: Vec<MessageTemplate> = self
            .templates
            .lock()
            .unwrap()
            .iter()
            .filter(|t| filter(t))
            .cloned()
            .collect();
        sort_templates(&mut result);
        result
    }
}

#[async_trait]
impl MessageTemplateRepository for MockMessageTemplateRepository {
    async fn find_by_owner(&self, owner_id: &UserId) -> Result<Vec<MessageTemplate>, InfraError> {
        Ok(self.collect_sorted(|t| t.owner_id() == Some(owner_id)))
    }

    async fn find_system_defaults(&self) -> Result<Vec<MessageTemplate>, InfraError> {
        Ok(self.collect_sorted(|t| t.owner_id().is_none()))
    }
}

// ===== MockUserRepository =====

#[derive(Clone, Default)]
pub struct MockUserRepository {
    users: Arc<Mutex<Vec<User>>>,
}

impl MockUserRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, user: User) {
        self.users.lock().unwrap().push(user);
    }
}

#[async_trait]
impl UserRepository for MockUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, InfraError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id() == id)
            .cloned())
    }
}

// ===== MockEmailLogRepository =====

#[derive(Clone, Default)]
pub struct MockEmailLogRepository {
    logs: Arc<Mutex<Vec<EmailLog>>>,
    fail: Arc<Mutex<bool>>,
}

impl MockEmailLogRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logs(&self) -> Vec<EmailLog> {
        self.logs.lock().unwrap().clone()
    }

    /// 以後の insert を失敗させる
    pub fn fail_inserts(&self) {
        *self.fail.lock().unwrap() = true;
    }
}

#[async_trait]
impl EmailLogRepository for MockEmailLogRepository {
    async fn insert(&self, log: &EmailLog) -> Result<(), InfraError> {
        if *self.fail.lock().unwrap() {
            return Err(InfraError::unexpected("注入されたログ記録エラー"));
        }
        self.logs.lock().unwrap().push(log.clone());
        Ok(())
    }
}

// ===== MockNotificationSender =====

/// 送信内容を記録するメール送信モック
///
/// 宛先ごとに「常に失敗」「応答しない」を設定できる。
#[derive(Clone, Default)]
pub struct MockNotificationSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failing_recipients: Arc<Mutex<HashSet<String>>>,
    hanging_recipients: Arc<Mutex<HashSet<String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockNotificationSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// 送信に成功したメール
    pub fn sent_emails(&self) -> Vec<EmailMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// 送信の呼び出し回数（失敗を含む）
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 指定した宛先への送信を常に失敗させる
    pub fn fail_for(&self, recipient: &str) {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
    }

    /// 指定した宛先への送信を応答しないままにする
    pub fn hang_for(&self, recipient: &str) {
        self.hanging_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
    }
}

#[async_trait]
impl NotificationSender for MockNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<MessageId, DeliveryError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);

        let hangs = self.hanging_recipients.lock().unwrap().contains(&email.to);
        if hangs {
            std::future::pending::<()>().await;
        }

        let fails = self.failing_recipients.lock().unwrap().contains(&email.to);
        if fails {
            return Err(DeliveryError::Rejected(format!(
                "注入された送信エラー: {}",
                email.to
            )));
        }

        self.sent.lock().unwrap().push(email.clone());
        Ok(MessageId::new(format!("mock-{call}")))
    }
}
