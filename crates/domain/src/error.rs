//! # ドメイン層エラー定義
//!
//! ビジネスルール違反やドメイン固有の例外状態を表現するエラー型。
//!
//! ## エラーの種類と HTTP ステータスの対応
//!
//! | エラー種別 | HTTP ステータス | 用途 |
//! |-----------|----------------|------|
//! | `Validation` | 400 Bad Request | 入力値の検証失敗・不正な状態遷移 |
//!
//! ## 使用例
//!
//! ```rust
//! use followupmate_domain::DomainError;
//!
//! fn validate_subject(subject: &str) -> Result<(), DomainError> {
//!     if subject.is_empty() {
//!         return Err(DomainError::Validation("件名は必須です".to_string()));
//!     }
//!     Ok(())
//! }
//!
//! assert!(validate_subject("").is_err());
//! ```

use thiserror::Error;

/// ドメイン層で発生するエラー
///
/// API 層でこのエラーを受け取り、適切な HTTP レスポンスに変換する。
#[derive(Debug, Error)]
pub enum DomainError {
    /// バリデーションエラー
    ///
    /// - 必須フィールドが未入力
    /// - 文字数制限の超過
    /// - 不正なフォーマット（メールアドレス、時刻）
    /// - 終端状態からの遷移
    #[error("バリデーションエラー: {0}")]
    Validation(String),
}
