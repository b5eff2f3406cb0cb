//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//! ハンドラは薄く保ち、処理はユースケース層に委譲する。

pub mod followup;
pub mod health;
pub mod scheduler;

pub use followup::{
    FollowUpApiState,
    create_followup,
    delete_followup,
    list_followups,
    mark_replied,
    reschedule_followup,
    update_followup_status,
};
pub use health::health_check;
pub use scheduler::{SchedulerState, run_scheduler};
