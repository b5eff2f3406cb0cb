//! # テンプレートレンダラー
//!
//! プレースホルダ置換済みの件名・本文から、送信用の [`EmailMessage`] を組み立てる。
//!
//! - **plaintext**: 置換済み本文をそのまま使う
//! - **HTML**: `include_str!` で埋め込んだレイアウトに、HTML エスケープして改行を
//!   `<br>` に変換した本文を流し込む
//! - **差出人表示名 / Reply-To**: 送信者（フォローアップの所有者）の名前とアドレス

use followupmate_domain::{
    notification::{DeliveryError, EmailMessage},
    user::User,
};
use tera::{Context, Tera};

use super::RenderedMessage;

const LAYOUT: &str = "followup.html";

/// メールの差出人情報
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
    pub name:  Option<String>,
    pub email: Option<String>,
}

impl From<&User> for Sender {
    fn from(user: &User) -> Self {
        Self {
            name:  Some(user.name().as_str().to_string()),
            email: Some(user.email().as_str().to_string()),
        }
    }
}

/// テンプレートレンダラー
///
/// tera テンプレートエンジンをラップし、HTML レイアウトを保持する。
pub struct TemplateRenderer {
    engine: Tera,
}

impl TemplateRenderer {
    /// 新しいレンダラーインスタンスを作成
    ///
    /// `include_str!` で埋め込んだレイアウトを tera に登録する。
    pub fn new() -> Result<Self, tera::Error> {
        let mut engine = Tera::default();
        engine.add_raw_template(
            LAYOUT,
            include_str!("../../../../../templates/email/followup.html"),
        )?;
        Ok(Self { engine })
    }

    /// 置換済みメッセージからメールを組み立てる
    ///
    /// # Errors
    ///
    /// レイアウトのレンダリングに失敗した場合は [`DeliveryError::Build`]。
    pub fn compose(
        &self,
        to: &str,
        rendered: &RenderedMessage,
        sender: &Sender,
    ) -> Result<EmailMessage, DeliveryError> {
        let mut context = Context::new();
        context.insert("subject", &rendered.subject);
        context.insert("body", &rendered.body);
        context.insert("sender_name", &sender.name);
        context.insert("sender_email", &sender.email);

        let html_body = self
            .engine
            .render(LAYOUT, &context)
            .map_err(|e| DeliveryError::Build(e.to_string()))?;

        Ok(EmailMessage {
            to: to.to_string(),
            from_name: sender.name.clone(),
            reply_to: sender.email.clone(),
            subject: rendered.subject.clone(),
            html_body,
            text_body: rendered.body.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn rendered(body: &str) -> RenderedMessage {
        RenderedMessage {
            subject: "お見積りの件".to_string(),
            body:    body.to_string(),
        }
    }

    fn sender() -> Sender {
        Sender {
            name:  Some("佐藤花子".to_string()),
            email: Some("sato@example.com".to_string()),
        }
    }

    #[test]
    fn test_newが正常に初期化される() {
        assert!(TemplateRenderer::new().is_ok());
    }

    #[test]
    fn test_差出人と返信先と本文が設定される() {
        let renderer = TemplateRenderer::new().unwrap();

        let email = renderer
            .compose("tanaka@example.com", &rendered("田中様\nご確認ください"), &sender())
            .unwrap();

        assert_eq!(email.to, "tanaka@example.com");
        assert_eq!(email.subject, "お見積りの件");
        assert_eq!(email.from_name.as_deref(), Some("佐藤花子"));
        assert_eq!(email.reply_to.as_deref(), Some("sato@example.com"));
        assert_eq!(email.text_body, "田中様\nご確認ください");
        assert!(email.html_body.contains("田中様<br>ご確認ください"));
        assert!(email.html_body.contains("佐藤花子"));
    }

    #[test]
    fn test_html本文はエスケープされる() {
        let renderer = TemplateRenderer::new().unwrap();

        let email = renderer
            .compose(
                "tanaka@example.com",
                &rendered("<script>alert(1)</script>"),
                &Sender::default(),
            )
            .unwrap();

        assert!(!email.html_body.contains("<script>"));
        assert!(email.html_body.contains("&lt;script&gt;"));
        assert_eq!(email.text_body, "<script>alert(1)</script>");
    }

    #[test]
    fn test_送信者が不明なら差出人情報なしで組み立てる() {
        let renderer = TemplateRenderer::new().unwrap();

        let email = renderer
            .compose("tanaka@example.com", &rendered("本文"), &Sender::default())
            .unwrap();

        assert_eq!(email.from_name, None);
        assert_eq!(email.reply_to, None);
    }
}
