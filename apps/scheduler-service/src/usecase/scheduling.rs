//! # スケジューリング
//!
//! - [`pass`] - 期日到来分を 1 回走査して送信・状態更新するスケジューリングパス
//! - [`runner`] - パスの定期実行と手動実行（同時実行の抑止を含む）

pub mod pass;
pub mod runner;

pub use pass::{PassSummary, SchedulingPass};
pub use runner::SchedulerRunner;
