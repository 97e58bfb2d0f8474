//! 日志与指标
//! 结构化日志初始化，以及各个门产出的指标注册

use crate::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 初始化结构化日志
/// RUST_LOG 优先；未设置时使用配置的级别，并压低 sqlx 的语句日志
pub fn init_telemetry(config: &AppConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},sqlx=warn", config.logging.level)));

    let log_layer = match config.logging.format.to_lowercase().as_str() {
        "pretty" => {
            // 开发环境：可读格式
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_target(false)
                .boxed()
        }
        _ => {
            // 生产环境：JSON，请求 span 关闭时输出耗时
            tracing_subscriber::fmt::layer()
                .json()
                .with_target(false)
                .with_span_events(tracing_subscriber::fmt::format::FmtSpan::CLOSE)
                .boxed()
        }
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(log_layer)
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        level = %config.logging.level,
        format = %config.logging.format,
        "Telemetry initialized"
    );
}

/// 注册本服务产出的指标及其说明
/// 指标在首次使用时自动创建，这里只补充描述信息
pub fn init_metrics() {
    metrics::describe_counter!("http_requests_total", "HTTP 请求总数（按状态码）");
    metrics::describe_histogram!("http_request_duration_seconds", "HTTP 请求处理耗时");

    metrics::describe_counter!("authz_denied_total", "授权门拒绝次数");
    metrics::describe_counter!("credential_stale_total", "过时凭证拒绝次数");
    metrics::describe_counter!("version_conflict_total", "乐观并发写入冲突次数");

    metrics::describe_counter!("webhook_accepted_total", "Webhook 验真通过次数");
    metrics::describe_counter!("webhook_rejected_total", "Webhook 验真拒绝次数（按原因）");
    metrics::describe_counter!("webhook_duplicate_total", "Webhook 重复投递次数");
    metrics::describe_counter!(
        "webhook_insecure_accept_total",
        "不安全模式下未经签名校验放行的次数"
    );
    metrics::describe_counter!("sign_events_received_total", "签署事件接收次数（按事件类型）");

    metrics::describe_counter!("audit_events_enqueued_total", "审计事件入队次数");
    metrics::describe_counter!("audit_events_dropped_total", "审计事件因队列满被丢弃的次数");
    metrics::describe_counter!("audit_events_failed_total", "审计事件落库失败次数");

    metrics::describe_gauge!("db_pool_size", "数据库连接池当前连接数");
    metrics::describe_gauge!("db_pool_idle", "数据库连接池空闲连接数");
    metrics::describe_histogram!("db_health_check_seconds", "数据库健康检查耗时");

    tracing::debug!("Metric descriptions registered");
}
