//! SES 通知送信実装
//!
//! AWS SES v2 API を使用してメールを送信する。
//! 本番環境で使用する。

use async_trait::async_trait;
use aws_sdk_sesv2::{
    Client,
    types::{Body, Content, Destination, EmailContent, Message},
};
use followupmate_domain::notification::{DeliveryError, EmailMessage, MessageId};

use super::NotificationSender;

/// SES 通知送信
pub struct SesNotificationSender {
    client:       Client,
    from_address: String,
}

impl SesNotificationSender {
    /// 新しい SES 送信インスタンスを作成
    ///
    /// `from_address` は SES で検証済みであること。
    pub fn new(client: Client, from_address: String) -> Self {
        Self {
            client,
            from_address,
        }
    }

    /// 環境変数・共有設定ファイルから AWS 設定を読み込んで作成する
    pub async fn from_env(from_address: String) -> Self {
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .load()
            .await;
        Self::new(Client::new(&config), from_address)
    }

    /// 差出人表示名付きの送信元（`"名前 <address>"`）
    fn from_header(&self, email: &EmailMessage) -> String {
        match &email.from_name {
            Some(name) => format!("\"{}\" <{}>", name.replace('"', ""), self.from_address),
            None => self.from_address.clone(),
        }
    }
}

fn content(data: &str, part: &str) -> Result<Content, DeliveryError> {
    Content::builder()
        .data(data)
        .charset("UTF-8")
        .build()
        .map_err(|e| DeliveryError::Build(format!("{part}構築失敗: {e}")))
}

#[async_trait]
impl NotificationSender for SesNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<MessageId, DeliveryError> {
        let destination = Destination::builder().to_addresses(&email.to).build();

        let content = EmailContent::builder()
            .simple(
                Message::builder()
                    .subject(content(&email.subject, "件名")?)
                    .body(
                        Body::builder()
                            .html(content(&email.html_body, "HTML 本文")?)
                            .text(content(&email.text_body, "テキスト本文")?)
                            .build(),
                    )
                    .build(),
            )
            .build();

        let output = self
            .client
            .send_email()
            .from_email_address(self.from_header(email))
            .set_reply_to_addresses(email.reply_to.clone().map(|r| vec![r]))
            .destination(destination)
            .content(content)
            .send()
            .await
            .map_err(|e| DeliveryError::Rejected(format!("SES 送信失敗: {e}")))?;

        Ok(MessageId::new(output.message_id().unwrap_or_default()))
    }
}
