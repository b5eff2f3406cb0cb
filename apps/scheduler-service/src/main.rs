//! # スケジューラサービス
//!
//! 期日を迎えたフォローアップにメールを送るスケジューラと、
//! フォローアップを操作する内部 API を 1 プロセスで提供する。
//!
//! ```text
//! ┌──────────────┐  内部 API   ┌────────────────────┐     ┌──────────────┐
//! │ 外部の画面層 │────────────→│ scheduler-service  │────→│  PostgreSQL  │
//! └──────────────┘             │  ├ 内部 API (axum) │     └──────────────┘
//!                              │  └ 定期実行ループ  │────→ SMTP / SES
//!                              └────────────────────┘
//! ```
//!
//! 環境変数は [`config`](followupmate_scheduler_service::config) を参照。
//!
//! ## 起動方法
//!
//! ```bash
//! DATABASE_URL=postgres://... cargo run -p followupmate-scheduler-service
//! ```

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use followupmate_domain::clock::{Clock, SystemClock};
use followupmate_infra::{
    db,
    notification::{
        NoopNotificationSender,
        NotificationSender,
        SesNotificationSender,
        SmtpNotificationSender,
    },
    repository::{
        EmailLogRepository,
        FollowUpRepository,
        MessageTemplateRepository,
        PostgresEmailLogRepository,
        PostgresFollowUpRepository,
        PostgresMessageTemplateRepository,
        PostgresUserRepository,
        UserRepository,
    },
};
use followupmate_scheduler_service::{
    app_builder::build_router,
    config::{NotificationBackend, NotificationConfig, SchedulerServiceConfig},
    handler::{FollowUpApiState, SchedulerState},
    usecase::{
        FollowUpUseCase,
        notification::{DeliveryAdapter, TemplateRenderer},
        scheduling::{SchedulerRunner, SchedulingPass},
    },
};
use followupmate_shared::observability::{TracingConfig, init_tracing};
use tokio::{net::TcpListener, sync::watch};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    init_tracing(TracingConfig::from_env("scheduler-service"));
    let _tracing_guard = tracing::info_span!("app", service = "scheduler-service").entered();

    let config = SchedulerServiceConfig::from_env().context("設定の読み込みに失敗しました")?;

    tracing::info!(
        "スケジューラサービスを起動します: {}:{}",
        config.host,
        config.port
    );

    let pool = db::create_pool(&config.database_url)
        .await
        .context("データベース接続に失敗しました")?;
    tracing::info!("データベースに接続しました");

    db::run_migrations(&pool)
        .await
        .context("マイグレーションの実行に失敗しました")?;
    tracing::info!("マイグレーションを適用しました");

    // 依存コンポーネントを初期化
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let followup_repo: Arc<dyn FollowUpRepository> =
        Arc::new(PostgresFollowUpRepository::new(pool.clone()));
    let template_repo: Arc<dyn MessageTemplateRepository> =
        Arc::new(PostgresMessageTemplateRepository::new(pool.clone()));
    let user_repo: Arc<dyn UserRepository> = Arc::new(PostgresUserRepository::new(pool.clone()));
    let email_log_repo: Arc<dyn EmailLogRepository> =
        Arc::new(PostgresEmailLogRepository::new(pool));
    let sender = build_sender(&config.notification).await;

    let delivery = DeliveryAdapter::new(
        sender,
        email_log_repo,
        clock.clone(),
        config.scheduler.delivery_timeout,
    );
    let renderer = TemplateRenderer::new().context("メールテンプレートの読み込みに失敗しました")?;
    let pass = SchedulingPass::new(
        followup_repo.clone(),
        template_repo,
        user_repo,
        renderer,
        delivery,
        config.policy.delays.clone(),
    )
    .with_concurrency(config.scheduler.concurrency);
    let runner = Arc::new(SchedulerRunner::new(pass, clock.clone()));

    let followup_state = Arc::new(FollowUpApiState {
        usecase: FollowUpUseCase::new(followup_repo, clock, config.policy.clone()),
    });
    let scheduler_state = Arc::new(SchedulerState {
        runner: runner.clone(),
    });
    let app = build_router(followup_state, scheduler_state);

    // 定期実行ループを開始
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = runner.spawn(
        config.scheduler.interval,
        config.scheduler.run_on_startup,
        shutdown_rx,
    );

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("バインドアドレスが不正です")?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("スケジューラサービスが起動しました: {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown_tx.send(true).ok();
    scheduler_handle.await.ok();
    tracing::info!("スケジューラサービスを停止しました");

    Ok(())
}

/// 設定に応じた送信バックエンドを構築する
async fn build_sender(config: &NotificationConfig) -> Arc<dyn NotificationSender> {
    match config.backend {
        NotificationBackend::Smtp => {
            tracing::info!(
                "通知バックエンド: SMTP ({}:{})",
                config.smtp_host,
                config.smtp_port
            );
            Arc::new(SmtpNotificationSender::new(
                &config.smtp_host,
                config.smtp_port,
                config.from_address.clone(),
            ))
        }
        NotificationBackend::Ses => {
            tracing::info!("通知バックエンド: SES");
            Arc::new(SesNotificationSender::from_env(config.from_address.clone()).await)
        }
        NotificationBackend::Noop => {
            tracing::info!("通知バックエンド: Noop（メール送信なし）");
            Arc::new(NoopNotificationSender)
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "シグナルハンドラの登録に失敗");
    }
    tracing::info!("停止シグナルを受信しました");
}
