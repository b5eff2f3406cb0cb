//! # ビジネスイベントログとエラーコンテキストの構造化ヘルパー
//!
//! ログフィールドの命名規約とヘルパーマクロを提供する。
//!
//! ## ビジネスイベント
//!
//! [`log_business_event!`] マクロで出力する。`event.kind = "business_event"` マーカーが
//! 自動付与され、`jq 'select(.["event.kind"] == "business_event")'` でフィルタできる。
//!
//! ## エラーコンテキスト
//!
//! `tracing::warn!` / `tracing::error!` に `error.category` + `error.kind` フィールドを
//! 直接追加する。定数は [`error`] モジュールで提供。
//!
//! ## フィールド命名規約
//!
//! ドット記法（`event.category`、`error.kind`）を使用する。JSON 出力では
//! フラットなキーになる。

/// ビジネスイベントを構造化ログとして出力する。
///
/// `event.kind = "business_event"` マーカーを自動付与し、
/// `tracing::info!` レベルで出力する。
///
/// ## 必須フィールド（慣例）
///
/// - `event.category`: イベントカテゴリ（[`event::category`] の定数を使用）
/// - `event.action`: アクション名（[`event::action`] の定数を使用）
/// - `event.result`: 結果（[`event::result`] の定数を使用）
///
/// ## 推奨フィールド
///
/// - `event.entity_type`: エンティティ種別（[`event::entity_type`] の定数を使用）
/// - `event.entity_id`: エンティティ ID
/// - `event.actor_id`: 操作者（所有者）ID
#[macro_export]
macro_rules! log_business_event {
    ($($args:tt)*) => {
        ::tracing::info!(
            event.kind = "business_event",
            $($args)*
        )
    };
}

/// イベントフィールドの定数
pub mod event {
    /// イベントカテゴリ
    pub mod category {
        pub const FOLLOWUP: &str = "followup";
        pub const SCHEDULER: &str = "scheduler";
        pub const NOTIFICATION: &str = "notification";
    }

    /// イベントアクション
    pub mod action {
        // フォローアップ
        pub const FOLLOWUP_CREATED: &str = "followup.created";
        pub const FOLLOWUP_STATUS_CHANGED: &str = "followup.status_changed";
        pub const FOLLOWUP_REPLIED: &str = "followup.replied";
        pub const FOLLOWUP_DELETED: &str = "followup.deleted";
        pub const FOLLOWUP_RESCHEDULED: &str = "followup.rescheduled";

        // スケジューラ
        pub const PASS_COMPLETED: &str = "scheduler.pass_completed";

        // 通知
        pub const NOTIFICATION_SENT: &str = "notification.sent";
        pub const NOTIFICATION_FAILED: &str = "notification.failed";
    }

    /// エンティティ種別
    pub mod entity_type {
        pub const FOLLOWUP: &str = "followup";
        pub const SCHEDULING_PASS: &str = "scheduling_pass";
        pub const EMAIL_LOG: &str = "email_log";
    }

    /// イベント結果
    pub mod result {
        pub const SUCCESS: &str = "success";
        pub const FAILURE: &str = "failure";
    }
}

/// エラーコンテキストフィールドの定数
pub mod error {
    /// エラーカテゴリ
    pub mod category {
        /// インフラストラクチャ（DB）
        pub const INFRASTRUCTURE: &str = "infrastructure";
        /// 外部サービス呼び出し（メール送信）
        pub const EXTERNAL_SERVICE: &str = "external_service";
        /// 設定・データ不足（テンプレート未設定など）
        pub const CONFIGURATION: &str = "configuration";
    }

    /// エラー種別
    pub mod kind {
        pub const DATABASE: &str = "database";
        pub const CONFLICT: &str = "conflict";
        pub const DELIVERY: &str = "delivery";
        pub const NO_TEMPLATE: &str = "no_template";
        pub const EMAIL_LOG: &str = "email_log";
        pub const INTERNAL: &str = "internal";
    }
}
