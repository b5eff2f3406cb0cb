//! # プレースホルダ置換
//!
//! テンプレートの件名・本文に含まれる `{{variable}}` を値で置き換える。
//!
//! - 変数名は `[A-Za-z_][A-Za-z0-9_]*`。`{{ name }}` のように内側に空白があるものは
//!   プレースホルダとみなさず、そのまま残す
//! - 対応する値が無いプレースホルダもそのまま残す（エラーにしない）
//!
//! 置換は副作用を持たず、テンプレートも変更しない。

use std::{collections::BTreeMap, sync::LazyLock};

use followupmate_domain::{followup::FollowUp, template::MessageTemplate, user::User};
use regex::{Captures, Regex};

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{([A-Za-z_][A-Za-z0-9_]*)\}\}").expect("placeholder regex must compile")
});

/// プレースホルダに埋め込む値
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderValues {
    values: BTreeMap<String, String>,
}

impl PlaceholderValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// 値を設定する（同名の値は上書き）
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// フォローアップ送信時の標準変数を組み立てる
    ///
    /// | 変数 | 値 |
    /// |---|---|
    /// | `client_name` / `client_email` | 顧客の名前とアドレス |
    /// | `subject` / `message` | フォローアップの件名と本文（本文未設定は空文字） |
    /// | `attempt_number` | 今回の送信が何回目か（1 始まり） |
    /// | `your_name` / `sender_name` / `sender_email` | 所有者（送信者）の名前とアドレス |
    ///
    /// 所有者が見つからない場合、送信者の変数は設定しない（プレースホルダのまま残る）。
    /// `project_type` / `company_name` はユーザーごとの値を持たないため設定しない。
    pub fn for_followup(followup: &FollowUp, sender: Option<&User>) -> Self {
        let values = Self::new()
            .with("client_name", followup.client_name().as_str())
            .with("client_email", followup.client_email().as_str())
            .with("subject", followup.subject().as_str())
            .with(
                "message",
                followup.message().map(|m| m.as_str()).unwrap_or_default(),
            )
            .with(
                "attempt_number",
                (followup.next_attempt_index() + 1).to_string(),
            );

        match sender {
            Some(user) => values
                .with("your_name", user.name().as_str())
                .with("sender_name", user.name().as_str())
                .with("sender_email", user.email().as_str()),
            None => values,
        }
    }
}

/// 置換済みの件名と本文
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body:    String,
}

/// 文字列中のプレースホルダを置換する
///
/// ```
/// use followupmate_scheduler_service::usecase::notification::{
///     PlaceholderValues,
///     render_placeholders,
/// };
///
/// let values = PlaceholderValues::new().with("client_name", "田中");
/// assert_eq!(
///     render_placeholders("{{client_name}} 様 {{unknown}}", &values),
///     "田中 様 {{unknown}}"
/// );
/// ```
pub fn render_placeholders(pattern: &str, values: &PlaceholderValues) -> String {
    PLACEHOLDER_RE
        .replace_all(pattern, |caps: &Captures<'_>| {
            values
                .get(&caps[1])
                .map_or_else(|| caps[0].to_string(), str::to_string)
        })
        .into_owned()
}

/// テンプレートの件名・本文を置換する
pub fn render(template: &MessageTemplate, values: &PlaceholderValues) -> RenderedMessage {
    RenderedMessage {
        subject: render_placeholders(template.subject_pattern(), values),
        body:    render_placeholders(template.body_pattern(), values),
    }
}
