//! # PostgreSQL データベース接続管理
//!
//! データベース接続プールの作成とマイグレーションの適用を行う。
//!
//! ## 使用例
//!
//! ```rust,ignore
//! use followupmate_infra::db;
//!
//! let pool = db::create_pool("postgres://localhost/followupmate").await?;
//! db::run_migrations(&pool).await?;
//! ```

use std::time::Duration;

use sqlx::{PgPool, postgres::PgPoolOptions};

/// データベースマイグレーションを実行する
///
/// `sqlx::migrate!()` マクロで埋め込まれたマイグレーションファイルを
/// 順番に適用する。適用済みのマイグレーションはスキップされる。
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../migrations").run(pool).await
}

/// PostgreSQL 接続プールを作成する
///
/// アプリケーション起動時に一度だけ呼び出し、作成したプールを
/// HTTP ハンドラとスケジューラで共有する。
///
/// - `max_connections(10)`: スケジューラの並列度 + HTTP リクエスト分
/// - `acquire_timeout(5秒)`: 接続取得のタイムアウト
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}
