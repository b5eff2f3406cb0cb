//! # 通知
//!
//! フォローアップメールの送信に関するドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 |
//! |---|------------|
//! | [`EmailMessage`] | 送信するメール（レンダリング済み） |
//! | [`MessageId`] | トランスポートが払い出したメッセージ ID |
//! | [`DeliveryError`] | 1 回の送信の失敗理由 |
//! | [`EmailLog`] | 送信試行の記録（成功・失敗とも） |
//!
//! 送信失敗は例外にせず、常に `Result` として呼び出し元に返す。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use thiserror::Error;

use crate::followup::FollowUpId;

define_uuid_id! {
    /// メール送信ログ ID
    ///
    /// email_logs テーブルの主キー。
    pub struct EmailLogId;
}

/// メールメッセージ
///
/// テンプレートレンダリングの出力。NotificationSender に渡される。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    /// 送信先メールアドレス
    pub to:        String,
    /// 差出人の表示名（送信者名）
    pub from_name: Option<String>,
    /// 返信先（送信者本人のアドレス）
    pub reply_to:  Option<String>,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
    /// プレーンテキスト本文
    pub text_body: String,
}

/// トランスポートが払い出したメッセージ ID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{_0}")]
pub struct MessageId(String);

impl MessageId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// メール送信エラー
///
/// 人間が読める失敗理由を保持する。呼び出し元はログに記録して処理を続ける。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// トランスポートが送信を拒否した
    #[error("送信が拒否されました: {0}")]
    Rejected(String),

    /// 宛先・差出人アドレスが不正
    #[error("メールアドレスが不正です: {0}")]
    InvalidAddress(String),

    /// タイムアウト
    #[error("送信がタイムアウトしました（{seconds} 秒）")]
    Timeout { seconds: u64 },

    /// メッセージの組み立てに失敗
    #[error("メッセージの組み立てに失敗: {0}")]
    Build(String),
}

/// 送信ログのステータス
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EmailLogStatus {
    Sent,
    Failed,
}

/// メール送信ログ
///
/// フォローアップごとの送信試行を 1 件ずつ記録する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailLog {
    pub id: EmailLogId,
    pub followup_id: FollowUpId,
    pub recipient: String,
    pub subject: String,
    /// 送信した試行番号（1 始まり）
    pub attempt_number: u32,
    pub status: EmailLogStatus,
    pub message_id: Option<MessageId>,
    pub error_message: Option<String>,
    pub sent_at: DateTime<Utc>,
}

impl EmailLog {
    /// 送信結果からログを作成する
    pub fn from_outcome(
        followup_id: FollowUpId,
        message: &EmailMessage,
        attempt_number: u32,
        outcome: &Result<MessageId, DeliveryError>,
        now: DateTime<Utc>,
    ) -> Self {
        let (status, message_id, error_message) = match outcome {
            Ok(id) => (EmailLogStatus::Sent, Some(id.clone()), None),
            Err(e) => (EmailLogStatus::Failed, None, Some(e.to_string())),
        };
        Self {
            id: EmailLogId::new(),
            followup_id,
            recipient: message.to.clone(),
            subject: message.subject.clone(),
            attempt_number,
            status,
            message_id,
            error_message,
            sent_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn message() -> EmailMessage {
        EmailMessage {
            to:        "client@example.com".to_string(),
            from_name: Some("佐藤".to_string()),
            reply_to:  Some("sato@example.com".to_string()),
            subject:   "ご連絡".to_string(),
            html_body: "<p>本文</p>".to_string(),
            text_body: "本文".to_string(),
        }
    }

    #[rstest]
    #[case(EmailLogStatus::Sent, "sent")]
    #[case(EmailLogStatus::Failed, "failed")]
    fn test_ログステータスの文字列変換(#[case] status: EmailLogStatus, #[case] s: &str) {
        assert_eq!(status.to_string(), s);
        assert_eq!(EmailLogStatus::from_str(s).unwrap(), status);
    }

    #[test]
    fn test_送信成功のログはメッセージidを持つ() {
        let now = Utc::now();
        let outcome = Ok(MessageId::new("<abc@example.com>"));

        let log = EmailLog::from_outcome(FollowUpId::new(), &message(), 2, &outcome, now);

        assert_eq!(log.status, EmailLogStatus::Sent);
        assert_eq!(log.message_id, Some(MessageId::new("<abc@example.com>")));
        assert_eq!(log.error_message, None);
        assert_eq!(log.attempt_number, 2);
        assert_eq!(log.recipient, "client@example.com");
    }

    #[test]
    fn test_送信失敗のログはエラー理由を持つ() {
        let outcome = Err(DeliveryError::Timeout { seconds: 30 });

        let log = EmailLog::from_outcome(FollowUpId::new(), &message(), 1, &outcome, Utc::now());

        assert_eq!(log.status, EmailLogStatus::Failed);
        assert_eq!(log.message_id, None);
        assert_eq!(
            log.error_message.as_deref(),
            Some("送信がタイムアウトしました（30 秒）")
        );
    }
}
