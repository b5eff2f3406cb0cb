//! # FollowUpMate ドメイン層
//!
//! フォローアップ（顧客への再連絡リマインダー）の中核となるドメインモデルを定義する。
//!
//! ## 設計方針
//!
//! このクレートは DDD（ドメイン駆動設計）の原則に従い、以下を提供する:
//!
//! - **エンティティ**: 一意の識別子を持つオブジェクト（例: FollowUp, MessageTemplate）
//! - **値オブジェクト**: 識別子を持たない不変オブジェクト（例: ClientName, Version）
//! - **ドメインサービス**: エンティティに属さないビジネスロジック（テンプレート選択）
//! - **ドメインエラー**: ビジネスルール違反を表現するエラー型
//!
//! ## 依存関係の方向
//!
//! ```text
//! app → infra → domain
//! ```
//!
//! ドメイン層はインフラ層（DB、SMTP）には一切依存しない。
//! 時刻も [`clock::Clock`] 経由で注入し、テストで固定できるようにする。
//!
//! ## モジュール構成
//!
//! - [`followup`] - フォローアップエンティティとスケジューリング状態遷移
//! - [`schedule`] - 試行ごとの待機日数テーブルと上限回数のポリシー
//! - [`template`] - メッセージテンプレートと試行回数によるテンプレート選択
//! - [`notification`] - 送信メッセージ・送信結果・メール送信ログ
//! - [`user`] - フォローアップの所有者（送信者）
//! - [`error`] - ドメイン層で発生するエラーの定義
//!
//! ## 使用例
//!
//! ```rust
//! use followupmate_domain::schedule::DelayTable;
//!
//! let delays = DelayTable::from_days(&[3, 7, 14]).unwrap();
//! assert_eq!(delays.delay_after(1).num_days(), 3);
//! assert_eq!(delays.delay_after(5).num_days(), 14);
//! ```

#[macro_use]
mod macros;

pub mod clock;
pub mod error;
pub mod followup;
pub mod notification;
pub mod schedule;
pub mod template;
pub mod user;
pub mod value_objects;

pub use error::DomainError;
