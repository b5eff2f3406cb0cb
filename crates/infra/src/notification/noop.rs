//! Noop 通知送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。
//! ローカル開発や送信無効化時に使用する。

use async_trait::async_trait;
use followupmate_domain::notification::{DeliveryError, EmailMessage, MessageId};
use uuid::Uuid;

use super::NotificationSender;

/// Noop 通知送信（ログ出力のみ）
#[derive(Debug, Clone)]
pub struct NoopNotificationSender;

#[async_trait]
impl NotificationSender for NoopNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<MessageId, DeliveryError> {
        let message_id = MessageId::new(format!("noop-{}", Uuid::now_v7()));
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            message_id = %message_id,
            "Noop: メール送信をスキップ"
        );
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_emailはnoopのメッセージidを返す() {
        let sender = NoopNotificationSender;
        let email = EmailMessage {
            to:        "client@example.com".to_string(),
            from_name: None,
            reply_to:  None,
            subject:   "テスト件名".to_string(),
            html_body: "<p>テスト</p>".to_string(),
            text_body: "テスト".to_string(),
        };

        let message_id = sender.send_email(&email).await.unwrap();

        assert!(message_id.as_str().starts_with("noop-"));
    }
}
