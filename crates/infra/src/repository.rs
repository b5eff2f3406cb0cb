//! # リポジトリ実装
//!
//! 永続化操作のトレイトと PostgreSQL 実装を提供する。
//!
//! ## 設計方針
//!
//! - **トレイト経由の注入**: ユースケースは `Arc<dyn XxxRepository>` に依存し、
//!   テストでは `mock` のインメモリ実装に差し替える
//! - **境界での正規化**: DB 行（`XxxRow`）からドメインモデルへの変換は
//!   `TryFrom` に集約し、不変条件の検証もここで行う
//! - **単一の更新経路**: フォローアップの更新は `update_with_version_check` のみ

pub mod email_log_repository;
pub mod followup_repository;
pub mod message_template_repository;
pub mod user_repository;

pub use email_log_repository::{EmailLogRepository, PostgresEmailLogRepository};
pub use followup_repository::{FollowUpRepository, PostgresFollowUpRepository};
pub use message_template_repository::{
    MessageTemplateRepository,
    PostgresMessageTemplateRepository,
};
pub use user_repository::{PostgresUserRepository, UserRepository};
