//! # ユーザー
//!
//! フォローアップの所有者であり、リマインダーメールの送信者でもある。
//! 認証・パスワード管理は外部サービスの責務のため、ここでは
//! スケジューラが差出人として使う最小限のプロフィールのみを扱う。

use chrono::{DateTime, Utc};

use crate::value_objects::Email;

define_uuid_id! {
    /// ユーザー ID
    pub struct UserId;
}

define_validated_string! {
    /// ユーザー表示名（値オブジェクト）
    ///
    /// メールの差出人表示名と `{{your_name}}` の置換に使う。
    pub struct UserName {
        label: "ユーザー名",
        min_length: 1,
        max_length: 100,
    }
}

/// ユーザーエンティティ（送信者プロフィール）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    name: UserName,
    email: Email,
    created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: UserId, name: UserName, email: Email, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            name,
            email,
            created_at,
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn name(&self) -> &UserName {
        &self.name
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ユーザーのgetterが値を返す() {
        let id = UserId::new();
        let now = Utc::now();
        let user = User::new(
            id.clone(),
            UserName::new("佐藤花子").unwrap(),
            Email::new("hanako@example.com").unwrap(),
            now,
        );

        assert_eq!(user.id(), &id);
        assert_eq!(user.name().as_str(), "佐藤花子");
        assert_eq!(user.email().as_str(), "hanako@example.com");
        assert_eq!(user.created_at(), now);
    }
}
