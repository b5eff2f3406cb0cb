//! # 共通値オブジェクト
//!
//! 複数のエンティティで共有される値オブジェクトを定義する。
//!
//! ## 設計方針
//!
//! - **Newtype パターン**: プリミティブ型をラップし、型安全性を確保
//! - **バリデーション**: 生成時に検証し、不正な値の存在を型レベルで排除
//! - **不変性**: 一度作成したら変更不可
//!
//! ## 含まれる型
//!
//! | 型 | ラップ対象 | 用途 |
//! |---|-----------|------|
//! | [`Version`] | `u32` | 楽観的ロック用のバージョン番号 |
//! | [`Email`] | `String` | 顧客・送信者のメールアドレス |
//! | [`ClientName`] | `String` | 顧客名（2〜100 文字） |
//! | [`Subject`] | `String` | フォローアップの件名（5〜200 文字） |
//! | [`FollowUpMessage`] | `String` | 任意の本文メモ（1000 文字以内） |
//! | [`TemplateName`] | `String` | テンプレート名 |
//! | [`MaxAttempts`] | `u32` | 送信回数の上限（1 以上） |

use serde::{Deserialize, Serialize};

use crate::DomainError;

// =========================================================================
// Version（バージョン番号）
// =========================================================================

/// バージョン番号（値オブジェクト）
///
/// 1 から始まり、更新のたびにインクリメントされる。
/// スケジューラと HTTP 経由の更新の双方が、このバージョンを条件に
/// 条件付き UPDATE を行う。
///
/// # 使用例
///
/// ```rust
/// use followupmate_domain::value_objects::Version;
///
/// let v1 = Version::initial();
/// assert_eq!(v1.as_u32(), 1);
/// assert_eq!(v1.next().as_u32(), 2);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u32);

impl Version {
    /// 初期バージョン（1）を作成する
    pub fn initial() -> Self {
        Self(1)
    }

    /// 指定した値からバージョンを作成する
    ///
    /// # エラー
    ///
    /// 0 の場合は `DomainError::Validation` を返す。
    pub fn new(value: u32) -> Result<Self, DomainError> {
        if value == 0 {
            return Err(DomainError::Validation(
                "バージョン番号は 1 以上である必要があります".to_string(),
            ));
        }
        Ok(Self(value))
    }

    /// 次のバージョンを返す
    ///
    /// i32 カラムに収まる範囲で飽和する。
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1).min(i32::MAX as u32))
    }

    /// 内部の u32 値を取得する
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// i32 に変換する（DB 互換用）
    pub fn as_i32(&self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl TryFrom<i32> for Version {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        if value <= 0 {
            return Err(DomainError::Validation(
                "バージョン番号は 1 以上である必要があります".to_string(),
            ));
        }
        Ok(Self(value as u32))
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::initial()
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

// =========================================================================
// Email（メールアドレス）
// =========================================================================

/// メールアドレス（値オブジェクト）
///
/// # 不変条件
///
/// - `local@domain` の形式
/// - ドメイン部に `.` を含み、先頭・末尾が `.` ではない
/// - 空白を含まない
/// - 最大 255 文字
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        if value.len() > 255 {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(Self::invalid_format());
        };

        let has_valid_domain = domain.contains('.')
            && !domain.starts_with('.')
            && !domain.ends_with('.')
            && !domain.contains('@');

        if local.is_empty() || !has_valid_domain || value.chars().any(char::is_whitespace) {
            return Err(Self::invalid_format());
        }

        Ok(Self(value))
    }

    fn invalid_format() -> DomainError {
        DomainError::Validation("メールアドレスの形式が不正です".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =========================================================================
// 文字列値オブジェクト
// =========================================================================

define_validated_string! {
    /// 顧客名（値オブジェクト）
    pub struct ClientName {
        label: "顧客名",
        min_length: 2,
        max_length: 100,
    }
}

define_validated_string! {
    /// フォローアップの件名（値オブジェクト）
    pub struct Subject {
        label: "件名",
        min_length: 5,
        max_length: 200,
    }
}

define_validated_string! {
    /// フォローアップの本文メモ（値オブジェクト）
    ///
    /// フォローアップ自体では任意項目のため、`Option<FollowUpMessage>` として保持する。
    pub struct FollowUpMessage {
        label: "メッセージ",
        min_length: 1,
        max_length: 1000,
    }
}

define_validated_string! {
    /// メッセージテンプレート名（値オブジェクト）
    pub struct TemplateName {
        label: "テンプレート名",
        min_length: 1,
        max_length: 100,
    }
}

impl FollowUpMessage {
    /// 空文字列を「未入力」として扱う変換
    ///
    /// フォームの空欄は `None`、それ以外は検証した値を返す。
    pub fn parse_optional(value: Option<String>) -> Result<Option<Self>, DomainError> {
        match value {
            Some(v) if !v.trim().is_empty() => Self::new(v).map(Some),
            _ => Ok(None),
        }
    }
}

// =========================================================================
// MaxAttempts（送信回数の上限）
// =========================================================================

/// 送信回数の上限（値オブジェクト）
///
/// # 不変条件
///
/// - 1 以上 [`MaxAttempts::MAX`] 以下
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MaxAttempts(u32);

impl MaxAttempts {
    /// 設定がない場合の既定値（3 回）
    pub const DEFAULT: Self = Self(3);

    /// 上限値
    pub const MAX: u32 = 100;

    pub fn new(value: u32) -> Result<Self, DomainError> {
        if !(1..=Self::MAX).contains(&value) {
            return Err(DomainError::Validation(format!(
                "最大送信回数は 1 以上 {} 以下である必要があります",
                Self::MAX
            )));
        }
        Ok(Self(value))
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// DB の INTEGER 列に保存する値
    ///
    /// 上限により常に `i32` に収まる。
    pub fn as_i32(&self) -> i32 {
        i32::try_from(self.0).unwrap_or(i32::MAX)
    }
}

impl TryFrom<i32> for MaxAttempts {
    type Error = DomainError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        let value = u32::try_from(value).map_err(|_| {
            DomainError::Validation("最大送信回数は 1 以上である必要があります".to_string())
        })?;
        Self::new(value)
    }
}

impl std::fmt::Display for MaxAttempts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_version_は1から始まりインクリメントされる() {
        let v1 = Version::initial();
        let v2 = v1.next();

        assert_eq!(v1.as_u32(), 1);
        assert_eq!(v2.as_u32(), 2);
        assert_eq!(v2.to_string(), "v2");
    }

    #[rstest]
    #[case(0)]
    #[case(-1)]
    fn test_version_は0以下を拒否する(#[case] value: i32) {
        assert!(Version::try_from(value).is_err());
    }

    #[rstest]
    #[case("client@example.com")]
    #[case("first.last+tag@mail.example.co.jp")]
    fn test_email_正常な形式を受け付ける(#[case] input: &str) {
        assert!(Email::new(input).is_ok());
    }

    #[rstest]
    #[case("")]
    #[case("no-at-sign")]
    #[case("@example.com")]
    #[case("user@localhost")]
    #[case("user@.example.com")]
    #[case("user@example.")]
    #[case("us er@example.com")]
    #[case("a@b@example.com")]
    fn test_email_不正な形式を拒否する(#[case] input: &str) {
        assert!(Email::new(input).is_err());
    }

    #[test]
    fn test_email_は256文字以上を拒否する() {
        let input = format!("{}@example.com", "a".repeat(250));
        assert!(Email::new(input).is_err());
    }

    #[test]
    fn test_email_前後の空白は除去される() {
        let email = Email::new("  client@example.com ").unwrap();
        assert_eq!(email.as_str(), "client@example.com");
    }

    #[rstest]
    #[case("田中", true)]
    #[case("A", false)]
    #[case("   ", false)]
    fn test_client_name_の文字数検証(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(ClientName::new(input).is_ok(), ok);
    }

    #[test]
    fn test_client_name_は101文字以上を拒否する() {
        assert!(ClientName::new("a".repeat(100)).is_ok());
        assert!(ClientName::new("a".repeat(101)).is_err());
    }

    #[rstest]
    #[case("Hi!", false)]
    #[case("Hello", true)]
    fn test_subject_は5文字以上が必要(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(Subject::new(input).is_ok(), ok);
    }

    #[test]
    fn test_follow_up_message_空欄はnoneになる() {
        assert_eq!(FollowUpMessage::parse_optional(None).unwrap(), None);
        assert_eq!(
            FollowUpMessage::parse_optional(Some("  ".to_string())).unwrap(),
            None
        );
    }

    #[test]
    fn test_follow_up_message_は1001文字以上を拒否する() {
        assert!(FollowUpMessage::parse_optional(Some("a".repeat(1001))).is_err());
        assert!(FollowUpMessage::parse_optional(Some("a".repeat(1000))).is_ok());
    }

    #[test]
    fn test_max_attempts_は0を拒否する() {
        assert!(MaxAttempts::new(0).is_err());
        assert!(MaxAttempts::try_from(-3).is_err());
        assert_eq!(MaxAttempts::new(3).unwrap().as_u32(), 3);
    }

    #[rstest]
    #[case(100, true)]
    #[case(101, false)]
    #[case(3_000_000_000, false)]
    fn test_max_attempts_は上限を超える値を拒否する(#[case] value: u32, #[case] ok: bool) {
        assert_eq!(MaxAttempts::new(value).is_ok(), ok);
    }

    #[test]
    fn test_max_attempts_はi32に損失なく変換される() {
        let max = MaxAttempts::new(MaxAttempts::MAX).unwrap();

        assert_eq!(MaxAttempts::try_from(max.as_i32()).unwrap(), max);
    }
}
