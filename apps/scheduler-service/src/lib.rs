//! # FollowUpMate スケジューラサービス
//!
//! 期日を迎えたフォローアップにメールを送り、送信回数と次回期日を進める
//! スケジューリングエンジンと、それを操作する内部 API を提供する。
//!
//! ## モジュール構成
//!
//! | モジュール | 役割 |
//! |---|---|
//! | [`config`] | 環境変数からの設定読み込み |
//! | [`usecase::notification`] | プレースホルダ置換・メール組み立て・送信アダプタ |
//! | [`usecase::scheduling`] | スケジューリングパスと定期実行ランナー |
//! | [`usecase::followup`] | フォローアップのコマンド（作成・状態変更・削除） |
//! | [`handler`] | axum ハンドラ |
//! | [`app_builder`] | State の組み立てとルーター構築 |

pub mod app_builder;
pub mod config;
pub mod error;
pub mod handler;
pub mod usecase;
