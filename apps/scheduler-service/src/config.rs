//! # スケジューラサービス設定
//!
//! 環境変数からスケジューラサービスの設定を読み込む。
//!
//! | 変数名 | デフォルト | 説明 |
//! |--------|-----------|------|
//! | `SCHEDULER_HOST` | `0.0.0.0` | 内部 API のバインドアドレス |
//! | `SCHEDULER_PORT` | `3002` | ポート番号 |
//! | `DATABASE_URL` | **必須** | PostgreSQL 接続 URL |
//! | `SCHEDULER_INTERVAL_SECS` | `3600` | スケジューリングパスの実行間隔 |
//! | `SCHEDULER_RUN_ON_STARTUP` | `false` | 起動直後に 1 回パスを実行するか |
//! | `SCHEDULER_CONCURRENCY` | `4` | 1 パス内で同時に処理するフォローアップ数 |
//! | `FOLLOWUP_DELAY_DAYS` | `3,7,14` | 送信回数ごとの待機日数 |
//! | `FOLLOWUP_DEFAULT_MAX_ATTEMPTS` | `3` | 新規フォローアップの既定送信上限 |
//! | `DELIVERY_TIMEOUT_SECS` | `30` | 1 回の送信のタイムアウト |
//! | `NOTIFICATION_BACKEND` | `noop` | `smtp` / `ses` / `noop` |
//! | `SMTP_HOST` / `SMTP_PORT` | `localhost` / `1025` | SMTP リレー |
//! | `NOTIFICATION_FROM_ADDRESS` | `noreply@followupmate.example.com` | 送信元アドレス |

use std::{env, str::FromStr, time::Duration};

use followupmate_domain::{
    schedule::{DelayTable, FollowUpPolicy},
    value_objects::MaxAttempts,
};
use thiserror::Error;

/// 設定読み込みエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 必須の環境変数が未設定
    #[error("{0} が設定されていません")]
    Missing(&'static str),

    /// 値の形式が不正
    #[error("{name} の値が不正です: {value:?} ({reason})")]
    Invalid {
        name:   &'static str,
        value:  String,
        reason: String,
    },
}

/// スケジューラサービスの設定
#[derive(Debug, Clone)]
pub struct SchedulerServiceConfig {
    /// バインドアドレス
    pub host: String,
    /// ポート番号
    pub port: u16,
    /// データベース接続 URL
    pub database_url: String,
    /// スケジューラ設定
    pub scheduler: SchedulerConfig,
    /// 送信間隔と送信上限
    pub policy: FollowUpPolicy,
    /// 通知設定
    pub notification: NotificationConfig,
}

/// 定期実行の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval:         Duration,
    pub run_on_startup:   bool,
    pub concurrency:      usize,
    pub delivery_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval:         Duration::from_secs(3600),
            run_on_startup:   false,
            concurrency:      4,
            delivery_timeout: Duration::from_secs(30),
        }
    }
}

/// 送信バックエンド
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationBackend {
    /// SMTP サーバー経由（開発では Mailpit）
    Smtp,
    /// Amazon SES v2 経由
    Ses,
    /// 送信しない（ログ出力のみ）
    Noop,
}

impl FromStr for NotificationBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "smtp" => Ok(Self::Smtp),
            "ses" => Ok(Self::Ses),
            "noop" => Ok(Self::Noop),
            other => Err(format!("smtp / ses / noop のいずれかを指定してください: {other}")),
        }
    }
}

/// 通知機能の設定
#[derive(Debug, Clone)]
pub struct NotificationConfig {
    pub backend:      NotificationBackend,
    /// SMTP ホスト（backend=smtp の場合に使用）
    pub smtp_host:    String,
    /// SMTP ポート（backend=smtp の場合に使用）
    pub smtp_port:    u16,
    /// 送信元メールアドレス
    pub from_address: String,
}

impl SchedulerServiceConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の参照関数から設定を読み込む
    ///
    /// `from_env` の実体。テストでは環境変数を汚さずに値を差し込める。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup: &lookup };

        let delays: DelayTable = vars.parse_or("FOLLOWUP_DELAY_DAYS", DelayTable::default())?;
        let max_attempts: u32 =
            vars.parse_or("FOLLOWUP_DEFAULT_MAX_ATTEMPTS", MaxAttempts::DEFAULT.as_u32())?;
        let default_max_attempts =
            MaxAttempts::new(max_attempts).map_err(|e| ConfigError::Invalid {
                name:   "FOLLOWUP_DEFAULT_MAX_ATTEMPTS",
                value:  max_attempts.to_string(),
                reason: e.to_string(),
            })?;

        let defaults = SchedulerConfig::default();
        let interval_secs: u64 =
            vars.parse_or("SCHEDULER_INTERVAL_SECS", defaults.interval.as_secs())?;
        let timeout_secs: u64 =
            vars.parse_or("DELIVERY_TIMEOUT_SECS", defaults.delivery_timeout.as_secs())?;
        let concurrency: usize = vars.parse_or("SCHEDULER_CONCURRENCY", defaults.concurrency)?;
        if interval_secs == 0 {
            return Err(vars.invalid("SCHEDULER_INTERVAL_SECS", "1 以上を指定してください"));
        }
        if timeout_secs == 0 {
            return Err(vars.invalid("DELIVERY_TIMEOUT_SECS", "1 以上を指定してください"));
        }
        if concurrency == 0 {
            return Err(vars.invalid("SCHEDULER_CONCURRENCY", "1 以上を指定してください"));
        }

        Ok(Self {
            host: vars.string_or("SCHEDULER_HOST", "0.0.0.0"),
            port: vars.parse_or("SCHEDULER_PORT", 3002)?,
            database_url: vars.required("DATABASE_URL")?,
            scheduler: SchedulerConfig {
                interval: Duration::from_secs(interval_secs),
                run_on_startup: vars.parse_or("SCHEDULER_RUN_ON_STARTUP", false)?,
                concurrency,
                delivery_timeout: Duration::from_secs(timeout_secs),
            },
            policy: FollowUpPolicy {
                delays,
                default_max_attempts,
            },
            notification: NotificationConfig {
                backend:      vars.parse_or("NOTIFICATION_BACKEND", NotificationBackend::Noop)?,
                smtp_host:    vars.string_or("SMTP_HOST", "localhost"),
                smtp_port:    vars.parse_or("SMTP_PORT", 1025)?,
                from_address: vars
                    .string_or("NOTIFICATION_FROM_ADDRESS", "noreply@followupmate.example.com"),
            },
        })
    }
}

struct Vars<'a, F> {
    lookup: &'a F,
}

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.get(name).ok_or(ConfigError::Missing(name))
    }

    fn string_or(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(value) = self.get(name) else {
            return Ok(default);
        };
        value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            value: value.clone(),
            reason: e.to_string(),
        })
    }

    fn invalid(&self, name: &'static str, reason: &str) -> ConfigError {
        ConfigError::Invalid {
            name,
            value: self.get(name).unwrap_or_default(),
            reason: reason.to_string(),
        }
    }
}
