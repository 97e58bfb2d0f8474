//! PostgreSQL 连接池与迁移
//! 权限、订单、审计三组表共用一个池；迁移在启动时嵌入执行

use crate::config::DatabaseConfig;
use secrecy::ExposeSecret;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::{Duration, Instant};

/// 数据库层错误
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Failed to connect to postgres: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// 创建数据库连接池
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DbError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
        .test_before_acquire(true)
        .connect(config.url.expose_secret())
        .await
        .map_err(DbError::Connect)?;

    tracing::info!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        acquire_timeout_secs = config.acquire_timeout_secs,
        "Database pool created"
    );

    Ok(pool)
}

/// 执行嵌入的迁移脚本
/// 权限模型和版本计数表必须就位后服务才能开始接收请求
pub async fn run_migrations(pool: &PgPool) -> Result<(), DbError> {
    let migrator = sqlx::migrate!("./migrations");
    let total = migrator.iter().count();

    tracing::info!(total, "Running database migrations");
    migrator.run(pool).await?;
    tracing::info!("Migrations completed");

    Ok(())
}

/// 数据库健康状态
#[derive(Debug, Clone)]
pub enum HealthStatus {
    Healthy,
    Unhealthy(String),
}

/// 数据库健康检查，记录探测耗时
pub async fn health_check(pool: &PgPool) -> HealthStatus {
    let started = Instant::now();
    let result = sqlx::query("SELECT 1").fetch_one(pool).await;
    metrics::histogram!("db_health_check_seconds").record(started.elapsed().as_secs_f64());

    match result {
        Ok(_) => HealthStatus::Healthy,
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            HealthStatus::Unhealthy(e.to_string())
        }
    }
}

/// 记录连接池指标
pub fn record_pool_metrics(pool: &PgPool) {
    metrics::gauge!("db_pool_size").set(pool.size() as f64);
    metrics::gauge!("db_pool_idle").set(pool.num_idle() as f64);
}
