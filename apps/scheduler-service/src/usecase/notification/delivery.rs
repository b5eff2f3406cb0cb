//! # 送信アダプタ
//!
//! レンダリング済みメールを 1 回だけ送信し、結果を送信ログに記録する。
//!
//! ## 設計方針
//!
//! - **1 呼び出し 1 送信**: 内部で再試行しない。再試行は次回のスケジューリングパスが担う
//! - **タイムアウト**: 応答しない送信は [`DeliveryError::Timeout`] として失敗扱いにする
//! - **ログ記録**: 成功・失敗どちらも `email_logs` に記録する。記録の失敗は送信結果に影響しない

use std::{sync::Arc, time::Duration};

use followupmate_domain::{
    clock::Clock,
    followup::FollowUp,
    notification::{DeliveryError, EmailLog, EmailMessage, MessageId},
};
use followupmate_infra::{notification::NotificationSender, repository::EmailLogRepository};
use followupmate_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};

/// 送信アダプタ
pub struct DeliveryAdapter {
    sender:   Arc<dyn NotificationSender>,
    log_repo: Arc<dyn EmailLogRepository>,
    clock:    Arc<dyn Clock>,
    timeout:  Duration,
}

impl DeliveryAdapter {
    pub fn new(
        sender: Arc<dyn NotificationSender>,
        log_repo: Arc<dyn EmailLogRepository>,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        Self {
            sender,
            log_repo,
            clock,
            timeout,
        }
    }

    /// フォローアップの次の試行としてメールを送信する
    ///
    /// 送信結果は常に `Result` で返し、パニックや例外で呼び出し元を止めない。
    pub async fn send(
        &self,
        followup: &FollowUp,
        email: &EmailMessage,
    ) -> Result<MessageId, DeliveryError> {
        let attempt_number = followup.attempt_count() + 1;

        let outcome = match tokio::time::timeout(self.timeout, self.sender.send_email(email)).await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout {
                seconds: self.timeout.as_secs(),
            }),
        };

        match &outcome {
            Ok(message_id) => log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_SENT,
                event.entity_type = event::entity_type::FOLLOWUP,
                event.entity_id = %followup.id(),
                event.actor_id = %followup.owner_id(),
                event.result = event::result::SUCCESS,
                notification.attempt = attempt_number,
                notification.message_id = %message_id,
                "フォローアップメール送信成功"
            ),
            Err(e) => log_business_event!(
                event.category = event::category::NOTIFICATION,
                event.action = event::action::NOTIFICATION_FAILED,
                event.entity_type = event::entity_type::FOLLOWUP,
                event.entity_id = %followup.id(),
                event.actor_id = %followup.owner_id(),
                event.result = event::result::FAILURE,
                notification.attempt = attempt_number,
                error = %e,
                "フォローアップメール送信失敗"
            ),
        }

        let log = EmailLog::from_outcome(
            followup.id().clone(),
            email,
            attempt_number,
            &outcome,
            self.clock.now(),
        );
        if let Err(e) = self.log_repo.insert(&log).await {
            tracing::error!(
                error.category = log_error::category::INFRASTRUCTURE,
                error.kind = log_error::kind::EMAIL_LOG,
                followup_id = %followup.id(),
                error = %e,
                "送信ログの記録に失敗"
            );
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use followupmate_domain::{
        clock::FixedClock,
        followup::{FollowUpId, NewFollowUp},
        notification::EmailLogStatus,
        user::UserId,
        value_objects::{ClientName, Email, MaxAttempts, Subject},
    };
    use followupmate_infra::mock::{MockEmailLogRepository, MockNotificationSender};
    use pretty_assertions::assert_eq;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_750_000_000, 0).unwrap()
    }

    fn followup() -> FollowUp {
        FollowUp::new(NewFollowUp {
            id: FollowUpId::new(),
            owner_id: UserId::new(),
            client_name: ClientName::new("田中太郎").unwrap(),
            client_email: Email::new("tanaka@example.com").unwrap(),
            client_phone: None,
            subject: Subject::new("ご提案の件について").unwrap(),
            message: None,
            follow_up_date: None,
            follow_up_time: None,
            max_attempts: MaxAttempts::DEFAULT,
            now: now(),
        })
    }

    fn email() -> EmailMessage {
        EmailMessage {
            to:        "tanaka@example.com".to_string(),
            from_name: None,
            reply_to:  None,
            subject:   "ご提案の件について".to_string(),
            html_body: "<p>本文</p>".to_string(),
            text_body: "本文".to_string(),
        }
    }

    fn adapter(
        sender: &MockNotificationSender,
        logs: &MockEmailLogRepository,
        timeout: Duration,
    ) -> DeliveryAdapter {
        DeliveryAdapter::new(
            Arc::new(sender.clone()),
            Arc::new(logs.clone()),
            Arc::new(FixedClock::new(now())),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_送信成功でメッセージidを返しログに記録する() {
        let sender = MockNotificationSender::new();
        let logs = MockEmailLogRepository::new();
        let sut = adapter(&sender, &logs, Duration::from_secs(5));

        let result = sut.send(&followup(), &email()).await;

        assert_eq!(result, Ok(MessageId::new("mock-0")));
        assert_eq!(sender.calls(), 1);
        let logs = logs.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, EmailLogStatus::Sent);
        assert_eq!(logs[0].attempt_number, 1);
        assert_eq!(logs[0].sent_at, now());
    }

    #[tokio::test]
    async fn test_送信失敗はエラーを返し再試行しない() {
        let sender = MockNotificationSender::new();
        sender.fail_for("tanaka@example.com");
        let logs = MockEmailLogRepository::new();
        let sut = adapter(&sender, &logs, Duration::from_secs(5));

        let result = sut.send(&followup(), &email()).await;

        assert!(matches!(result, Err(DeliveryError::Rejected(_))));
        assert_eq!(sender.calls(), 1);
        assert_eq!(logs.logs()[0].status, EmailLogStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_応答しない送信はタイムアウトで失敗になる() {
        let sender = MockNotificationSender::new();
        sender.hang_for("tanaka@example.com");
        let logs = MockEmailLogRepository::new();
        let sut = adapter(&sender, &logs, Duration::from_secs(30));

        let result = sut.send(&followup(), &email()).await;

        assert_eq!(result, Err(DeliveryError::Timeout { seconds: 30 }));
        assert_eq!(
            logs.logs()[0].error_message.as_deref(),
            Some("送信がタイムアウトしました（30 秒）")
        );
    }

    #[tokio::test]
    async fn test_ログ記録の失敗は送信結果に影響しない() {
        let sender = MockNotificationSender::new();
        let logs = MockEmailLogRepository::new();
        logs.fail_inserts();
        let sut = adapter(&sender, &logs, Duration::from_secs(5));

        let result = sut.send(&followup(), &email()).await;

        assert!(result.is_ok());
    }
}
