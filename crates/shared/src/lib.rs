//! # FollowUpMate 共有ユーティリティ
//!
//! FollowUpMate の各クレートで使用される共通ユーティリティを提供する。
//!
//! ## 設計方針
//!
//! - ビジネスロジックを含まない純粋なユーティリティのみを配置
//! - トレーシング関連の依存は `observability` feature の背後に置く

pub mod api_response;
pub mod event_log;
pub mod health;
pub mod observability;

pub use api_response::ApiResponse;
pub use health::HealthResponse;
