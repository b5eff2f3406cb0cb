//! # メッセージテンプレート
//!
//! フォローアップメールの件名・本文のひな型。`{{client_name}}` などの
//! プレースホルダを含み、送信時に値を埋め込む。
//!
//! 所有者ごとに並び順（`position`）付きのシーケンスを持ち、N 回目の送信には
//! N 番目のテンプレートを使う。所有者を持たないテンプレートは
//! システム全体の既定シーケンスになる。

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{user::UserId, value_objects::TemplateName};

define_uuid_id! {
    /// メッセージテンプレート ID
    pub struct MessageTemplateId;
}

/// メッセージテンプレートエンティティ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    id: MessageTemplateId,
    owner_id: Option<UserId>,
    name: TemplateName,
    subject_pattern: String,
    body_pattern: String,
    position: i32,
    is_default: bool,
    created_at: DateTime<Utc>,
}

/// テンプレートの新規作成・DB 復元パラメータ
pub struct MessageTemplateRecord {
    pub id: MessageTemplateId,
    pub owner_id: Option<UserId>,
    pub name: TemplateName,
    pub subject_pattern: String,
    pub body_pattern: String,
    pub position: i32,
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageTemplate {
    pub fn new(record: MessageTemplateRecord) -> Self {
        Self {
            id: record.id,
            owner_id: record.owner_id,
            name: record.name,
            subject_pattern: record.subject_pattern,
            body_pattern: record.body_pattern,
            position: record.position,
            is_default: record.is_default,
            created_at: record.created_at,
        }
    }

    pub fn id(&self) -> &MessageTemplateId {
        &self.id
    }

    /// 所有者（`None` はシステム既定テンプレート）
    pub fn owner_id(&self) -> Option<&UserId> {
        self.owner_id.as_ref()
    }

    pub fn name(&self) -> &TemplateName {
        &self.name
    }

    pub fn subject_pattern(&self) -> &str {
        &self.subject_pattern
    }

    pub fn body_pattern(&self) -> &str {
        &self.body_pattern
    }

    pub fn position(&self) -> i32 {
        self.position
    }

    pub fn is_default(&self) -> bool {
        self.is_default
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// テンプレート選択エラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemplateSelectionError {
    /// 所有者のテンプレートもシステム既定テンプレートも存在しない
    #[error("利用可能なテンプレートがありません")]
    NoTemplateAvailable,
}

/// 送信する試行に使うテンプレートを選ぶ
///
/// `templates` は並び順に整列済みであること。`attempt_index`（0 始まり）番目を返し、
/// 範囲外なら最後のテンプレートを返す（シーケンスは尽きず、最後で頭打ちになる）。
///
/// # Errors
///
/// `templates` が空の場合は [`TemplateSelectionError::NoTemplateAvailable`]。
pub fn select_template(
    templates: &[MessageTemplate],
    attempt_index: usize,
) -> Result<&MessageTemplate, TemplateSelectionError> {
    templates
        .get(attempt_index)
        .or_else(|| templates.last())
        .ok_or(TemplateSelectionError::NoTemplateAvailable)
}

/// テンプレートを並び順（position, id）に整列する
pub fn sort_templates(templates: &mut [MessageTemplate]) {
    templates.sort_by(|a, b| {
        a.position
            .cmp(&b.position)
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn template(position: i32) -> MessageTemplate {
        MessageTemplate::new(MessageTemplateRecord {
            id: MessageTemplateId::new(),
            owner_id: Some(UserId::new()),
            name: TemplateName::new(format!("テンプレート{position}")).unwrap(),
            subject_pattern: format!("件名 {position}"),
            body_pattern: "{{client_name}} 様".to_string(),
            position,
            is_default: false,
            created_at: Utc::now(),
        })
    }

    fn record_of(t: &MessageTemplate) -> MessageTemplateRecord {
        MessageTemplateRecord {
            id: t.id().clone(),
            owner_id: t.owner_id().cloned(),
            name: t.name().clone(),
            subject_pattern: t.subject_pattern().to_string(),
            body_pattern: t.body_pattern().to_string(),
            position: t.position(),
            is_default: t.is_default(),
            created_at: t.created_at(),
        }
    }

    #[rstest]
    #[case(0, 0)]
    #[case(1, 1)]
    #[case(2, 2)]
    #[case(3, 2)]
    #[case(4, 2)]
    fn test_試行インデックスに応じたテンプレートを選び最後で頭打ちになる(
        #[case] attempt_index: usize,
        #[case] expected_position: i32,
    ) {
        let templates = vec![template(0), template(1), template(2)];

        let selected = select_template(&templates, attempt_index).unwrap();

        assert_eq!(selected.position(), expected_position);
    }

    #[test]
    fn test_テンプレートがなければno_template_available() {
        assert_eq!(
            select_template(&[], 0),
            Err(TemplateSelectionError::NoTemplateAvailable)
        );
    }

    #[test]
    fn test_並び順はpositionの昇順() {
        let mut templates = vec![template(2), template(0), template(1)];

        sort_templates(&mut templates);

        let positions: Vec<i32> = templates.iter().map(MessageTemplate::position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_同じpositionはid順に並ぶ() {
        let with_id = |n: u128| {
            MessageTemplate::new(MessageTemplateRecord {
                id: MessageTemplateId::from_uuid(uuid::Uuid::from_u128(n)),
                ..record_of(&template(0))
            })
        };
        let first = with_id(1);
        let second = with_id(2);
        let mut templates = vec![second.clone(), first.clone()];

        sort_templates(&mut templates);

        assert_eq!(templates[0].id(), first.id());
        assert_eq!(templates[1].id(), second.id());
    }
}
