//! SMTP 通知送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用してメールを送信する。
//! 開発環境では Mailpit（ローカル SMTP サーバー）に接続する。

use async_trait::async_trait;
use followupmate_domain::notification::{DeliveryError, EmailMessage, MessageId};
use lettre::{
    Address,
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Mailbox, Message, MultiPart, SinglePart, header::ContentType},
};
use uuid::Uuid;

use super::{NotificationSender, domain_of};

/// SMTP 通知送信
///
/// `lettre::AsyncSmtpTransport<Tokio1Executor>` をラップする。
pub struct SmtpNotificationSender {
    transport:    AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpNotificationSender {
    /// 新しい SMTP 送信インスタンスを作成
    ///
    /// - `host`: SMTP サーバーのホスト名（例: "localhost"）
    /// - `port`: SMTP サーバーのポート番号（例: 1025 for Mailpit）
    /// - `from_address`: 送信元メールアドレス
    pub fn new(host: &str, port: u16, from_address: String) -> Self {
        // builder_dangerous: TLS なしで接続（Mailpit 等のローカル SMTP 向け）
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();

        Self {
            transport,
            from_address,
        }
    }

    /// lettre のメッセージを組み立てる
    ///
    /// 差出人は送信元アドレス + 送信者の表示名、返信先は送信者本人のアドレス。
    fn build_message(
        &self,
        email: &EmailMessage,
        message_id: &str,
    ) -> Result<Message, DeliveryError> {
        let from_address: Address = self
            .from_address
            .parse()
            .map_err(|e| DeliveryError::InvalidAddress(format!("送信元アドレス不正: {e}")))?;
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| DeliveryError::InvalidAddress(format!("宛先アドレス不正: {e}")))?;

        let mut builder = Message::builder()
            .from(Mailbox::new(email.from_name.clone(), from_address))
            .to(to)
            .subject(&email.subject)
            .message_id(Some(message_id.to_string()));

        if let Some(reply_to) = &email.reply_to {
            let reply_to: Mailbox = reply_to
                .parse()
                .map_err(|e| DeliveryError::InvalidAddress(format!("返信先アドレス不正: {e}")))?;
            builder = builder.reply_to(reply_to);
        }

        builder
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| DeliveryError::Build(e.to_string()))
    }
}

#[async_trait]
impl NotificationSender for SmtpNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<MessageId, DeliveryError> {
        let message_id = format!("<{}@{}>", Uuid::now_v7(), domain_of(&self.from_address));
        let message = self.build_message(email, &message_id)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| DeliveryError::Rejected(format!("SMTP 送信失敗: {e}")))?;

        Ok(MessageId::new(message_id))
    }
}
