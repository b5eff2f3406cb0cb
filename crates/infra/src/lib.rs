//! # FollowUpMate インフラ層
//!
//! 外部システムとの接続・通信を担当するインフラストラクチャ層。
//!
//! ## 責務
//!
//! - **データベース接続**: PostgreSQL への接続プール管理とマイグレーション
//! - **リポジトリ実装**: フォローアップ・テンプレート・ユーザー・送信ログの永続化
//! - **メール送信**: SMTP / Amazon SES / Noop の送信トランスポート
//!
//! ## 依存関係
//!
//! ```text
//! scheduler-service → infra → domain
//! ```
//!
//! ## モジュール構成
//!
//! - [`db`] - PostgreSQL データベース接続管理
//! - [`error`] - インフラ層エラー定義
//! - [`notification`] - メール送信トランスポート
//! - [`repository`] - リポジトリ実装
//! - `mock` - テスト用のインメモリ実装（`test-utils` feature）

pub mod db;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod mock;
pub mod notification;
pub mod repository;

pub use error::{InfraError, InfraErrorKind};
