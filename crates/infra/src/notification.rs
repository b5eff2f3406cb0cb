//! # メール送信
//!
//! フォローアップメールの送信を担当するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `NotificationSender` trait でメール送信を抽象化
//! - **3 つの実装**: SMTP（開発・リレー用）、SES（本番用）、Noop（送信無効化）
//! - **環境変数切替**: `NOTIFICATION_BACKEND` でランタイム選択
//! - **1 呼び出し 1 送信**: 実装内部ではリトライしない。再送はスケジューラが次回パスで行う

mod noop;
mod ses;
mod smtp;

use async_trait::async_trait;
use followupmate_domain::notification::{DeliveryError, EmailMessage, MessageId};
pub use noop::NoopNotificationSender;
pub use ses::SesNotificationSender;
pub use smtp::SmtpNotificationSender;

/// メール送信トレイト
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// メールを 1 通送信し、トランスポートが払い出したメッセージ ID を返す
    async fn send_email(&self, email: &EmailMessage) -> Result<MessageId, DeliveryError>;
}

/// 送信元アドレスのドメイン部を返す（Message-ID の生成用）
fn domain_of(address: &str) -> &str {
    address
        .rsplit_once('@')
        .map_or("localhost", |(_, domain)| domain)
}
