//! # 通知ユースケース
//!
//! フォローアップメールの生成と送信を担当する。
//!
//! ## モジュール構成
//!
//! - [`placeholder`] - `{{variable}}` プレースホルダの置換（純粋関数）
//! - [`template_renderer`] - tera によるメール（HTML / plaintext）の組み立て
//! - [`delivery`] - タイムアウト付きの 1 回送信と送信ログ記録

pub mod delivery;
pub mod placeholder;
pub mod template_renderer;

pub use delivery::DeliveryAdapter;
pub use placeholder::{PlaceholderValues, RenderedMessage, render, render_placeholders};
pub use template_renderer::{Sender, TemplateRenderer};
