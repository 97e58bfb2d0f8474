use signflow_service::{
    auth::{jwt::JwtService, webhook::WebhookGate},
    cache::TtlCache,
    config::AppConfig,
    db,
    handlers::health,
    middleware::AppState,
    routes,
    services::{AuditService, FreshnessService, PermissionService},
    telemetry,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 {
        match args[1].as_str() {
            "--version" => {
                println!("signflow-service {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" => {
                print_help();
                return Ok(());
            }
            _ => {
                eprintln!("未知参数: {}", args[1]);
                print_help();
                std::process::exit(1);
            }
        }
    }

    if let Ok(profile) = std::env::var("SIGNFLOW_ENV") {
        dotenv::from_filename(format!(".env.{}", profile)).ok();
    } else {
        dotenv::from_filename(".env.local").ok();
        dotenv::dotenv().ok();
    }

    health::set_start_time();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!("Failed to load configuration: {}", e)
    })?;

    telemetry::init_telemetry(&config);
    telemetry::init_metrics();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Signflow service starting...");

    let db_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&db_pool).await?;

    tracing::info!("Database initialized");

    // 凭证新鲜度缓存与 Webhook 去重缓存分开持有，键空间与清理策略互不干扰
    let freshness_cache = Arc::new(TtlCache::new());
    let webhook_dedup_cache = Arc::new(TtlCache::new());

    let jwt_service = Arc::new(JwtService::from_config(&config)?);
    let permission_service = Arc::new(PermissionService::new(db_pool.clone()));
    let freshness_service = Arc::new(FreshnessService::new(
        db_pool.clone(),
        freshness_cache.clone(),
        config.cache.user_version_ttl_secs,
    ));

    let (audit_service, audit_drain) =
        AuditService::new(db_pool.clone(), config.audit_queue_capacity);
    let audit_handle = tokio::spawn(audit_drain.run());

    let webhook_gate = Arc::new(WebhookGate::from_config(
        &config.webhook,
        webhook_dedup_cache.clone(),
    ));

    // 后台定期清理过期缓存条目
    let sweep_interval = config.cache.sweep_interval_secs;
    let sweeper_freshness = freshness_cache;
    let sweeper_dedup = webhook_dedup_cache;
    tokio::spawn(async move {
        let mut interval =
            tokio::time::interval(tokio::time::Duration::from_secs(sweep_interval));
        loop {
            interval.tick().await;
            let removed = sweeper_freshness.sweep() + sweeper_dedup.sweep();
            if removed > 0 {
                tracing::debug!(removed = removed, "Expired cache entries swept");
            }
        }
    });

    let app_state = Arc::new(AppState {
        config: config.clone(),
        db: db_pool.clone(),
        jwt_service,
        permission_service,
        freshness_service,
        audit_service,
        webhook_gate,
    });

    let app = routes::create_router(app_state.clone());

    let addr = &config.server.addr;
    let listener = TcpListener::bind(addr).await?;

    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 释放状态，关闭审计发送端，排空队列后退出
    drop(app_state);
    let drain_timeout =
        tokio::time::Duration::from_secs(config.server.graceful_shutdown_timeout_secs);
    if tokio::time::timeout(drain_timeout, audit_handle).await.is_err() {
        tracing::warn!("Audit drain did not finish within shutdown timeout");
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Ctrl+C received, starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Terminate signal received, starting graceful shutdown");
        },
    }
}

fn print_help() {
    println!("signflow-service {}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("用法: signflow-service [选项]");
    println!();
    println!("选项:");
    println!("  --version     打印版本信息并退出");
    println!("  --help        打印此帮助信息并退出");
    println!();
    println!("环境变量:");
    println!("  所有配置通过环境变量完成，前缀为 SIGNFLOW_");
    println!("  可用选项请参考 .env.example");
}
