//! # ユースケース層
//!
//! - [`followup`] - フォローアップのコマンド（作成・一覧・状態変更・削除）
//! - [`notification`] - メールの生成と送信
//! - [`scheduling`] - スケジューリングパスと定期実行

pub mod followup;
pub mod notification;
pub mod scheduling;

pub use followup::{CreateFollowUpInput, FollowUpUseCase};
