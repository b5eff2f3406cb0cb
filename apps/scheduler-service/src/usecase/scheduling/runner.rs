//! # スケジューラランナー
//!
//! スケジューリングパスを一定間隔で起動する。手動実行の入口も提供する。
//!
//! ## 同時実行の抑止
//!
//! パスは [`tokio::sync::Mutex`] の中にあり、同時に 2 つのパスが走ることはない。
//!
//! | 起動元 | ロック取得 | 実行中のパスがある場合 |
//! |---|---|---|
//! | 定期実行（tick） | `try_lock` | スキップしてログに残す |
//! | 手動実行（[`SchedulerRunner::run_now`]） | `lock` | 終わるのを待ってから 1 回実行 |

use std::{sync::Arc, time::Duration};

use followupmate_domain::clock::Clock;
use followupmate_infra::InfraError;
use followupmate_shared::event_log::error as log_error;
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::MissedTickBehavior,
};

use super::{PassSummary, SchedulingPass};

/// スケジューラランナー
pub struct SchedulerRunner {
    pass:  Mutex<SchedulingPass>,
    clock: Arc<dyn Clock>,
}

impl SchedulerRunner {
    pub fn new(pass: SchedulingPass, clock: Arc<dyn Clock>) -> Self {
        Self {
            pass: Mutex::new(pass),
            clock,
        }
    }

    /// パスを 1 回同期的に実行する（手動実行）
    ///
    /// 実行中のパスがあれば完了を待つ。
    pub async fn run_now(&self) -> Result<PassSummary, InfraError> {
        let pass = self.pass.lock().await;
        pass.run(self.clock.now()).await
    }

    /// 実行中のパスが無ければ 1 回実行する
    ///
    /// 実行中のパスがある場合は何もせず `None` を返す。
    pub async fn try_run(&self) -> Option<Result<PassSummary, InfraError>> {
        let Ok(pass) = self.pass.try_lock() else {
            tracing::warn!("前回のスケジューリングパスが実行中のため、今回の起動をスキップします");
            return None;
        };
        Some(pass.run(self.clock.now()).await)
    }

    async fn tick(&self) {
        match self.try_run().await {
            Some(Ok(summary)) => {
                tracing::debug!(?summary, "定期スケジューリングパスが完了");
            }
            Some(Err(e)) => {
                tracing::error!(
                    error.category = log_error::category::INFRASTRUCTURE,
                    error.kind = log_error::kind::DATABASE,
                    error = %e,
                    span_trace = %e.span_trace(),
                    "スケジューリングパスの走査に失敗"
                );
            }
            None => {}
        }
    }

    /// 定期実行ループを開始する
    ///
    /// `interval` ごとにパスを起動する。各パスは別タスクで実行されるため、
    /// 長引いたパスがあっても次の tick は到来し、`try_lock` によりスキップされる。
    /// `shutdown` が `true` になるか送信側が破棄されるとループを終了する
    /// （実行中のパスは最後まで走る）。
    pub fn spawn(
        self: Arc<Self>,
        interval: Duration,
        run_on_startup: bool,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            if !run_on_startup {
                // interval の初回 tick は即時に完了する
                ticker.tick().await;
            }

            tracing::info!(
                interval_secs = interval.as_secs(),
                run_on_startup,
                "スケジューラを開始しました"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let runner = Arc::clone(&self);
                        tokio::spawn(async move { runner.tick().await });
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("スケジューラを停止しました");
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use followupmate_domain::{clock::FixedClock, schedule::DelayTable};
    use followupmate_infra::mock::{
        MockEmailLogRepository,
        MockFollowUpRepository,
        MockMessageTemplateRepository,
        MockNotificationSender,
        MockUserRepository,
    };
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::usecase::notification::{DeliveryAdapter, TemplateRenderer};

    fn runner() -> SchedulerRunner {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(
            DateTime::<Utc>::from_timestamp(1_750_000_000, 0).unwrap(),
        ));
        let delivery = DeliveryAdapter::new(
            Arc::new(MockNotificationSender::new()),
            Arc::new(MockEmailLogRepository::new()),
            clock.clone(),
            Duration::from_secs(5),
        );
        let pass = SchedulingPass::new(
            Arc::new(MockFollowUpRepository::new()),
            Arc::new(MockMessageTemplateRepository::new()),
            Arc::new(MockUserRepository::new()),
            TemplateRenderer::new().unwrap(),
            delivery,
            DelayTable::default(),
        );
        SchedulerRunner::new(pass, clock)
    }

    #[tokio::test]
    async fn test_run_nowは1回のパスを実行して集計を返す() {
        let sut = runner();

        let summary = sut.run_now().await.unwrap();

        assert_eq!(summary, PassSummary::default());
    }

    #[tokio::test]
    async fn test_実行中のパスがあればtry_runはスキップする() {
        let sut = runner();
        let _running = sut.pass.lock().await;

        assert!(sut.try_run().await.is_none());
    }

    #[tokio::test]
    async fn test_shutdownでループが終了する() {
        let sut = Arc::new(runner());
        let (tx, rx) = watch::channel(false);

        let handle = sut.spawn(Duration::from_secs(3600), false, rx);
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
