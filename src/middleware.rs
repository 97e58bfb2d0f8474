//! HTTP 中间件
//! 应用状态与请求追踪

use axum::{
    extract::Request,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// 应用状态
///
/// AppState 内部使用 Arc 包装服务,这样:
/// 1. 多个请求可以共享服务实例
/// 2. 缓存等能力显式传递，而不是通过全局单例获取
/// 3. Clone 成本低廉(Arc 是指针拷贝)
///
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::AppConfig,
    pub db: sqlx::PgPool,
    pub jwt_service: Arc<crate::auth::jwt::JwtService>,
    pub permission_service: Arc<crate::services::PermissionService>,
    pub freshness_service: Arc<crate::services::FreshnessService>,
    pub audit_service: crate::services::AuditService,
    /// Webhook 验真门（独立管线，仅回调路径使用）
    pub webhook_gate: Arc<crate::auth::webhook::WebhookGate>,
}

/// 请求关联上下文
/// 追踪中间件写入请求扩展，下游的门和错误响应读取同一组标识
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub trace_id: String,
    pub request_id: String,
}

tokio::task_local! {
    static REQUEST_CONTEXT: RequestContext;
}

impl RequestContext {
    /// 读取当前任务的请求上下文
    /// 在追踪中间件作用域之外调用时返回 None
    pub fn current() -> Option<RequestContext> {
        REQUEST_CONTEXT.try_with(|ctx| ctx.clone()).ok()
    }
}

/// 请求追踪中间件
/// 为每个请求生成 trace_id 和 request_id，并记录指标
pub async fn request_tracking_middleware(mut req: Request, next: Next) -> Response {
    // 生成或提取 trace_id/request_id
    let trace_id = extract_or_generate_trace_id(req.headers());
    let request_id = Uuid::new_v4().to_string();

    let context = RequestContext {
        trace_id: trace_id.clone(),
        request_id: request_id.clone(),
    };
    req.extensions_mut().insert(context.clone());

    let method = req.method().to_string();
    let uri = req.uri().to_string();

    // 创建 span
    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        request_id = %request_id,
        method = %method,
        uri = %uri,
    );

    let handle = async move {
        let start = Instant::now();

        // 继续处理请求
        let response = next.run(req).await;

        let elapsed = start.elapsed();
        let status = response.status().as_u16();

        let status_code = match status {
            200 => "200",
            201 => "201",
            204 => "204",
            400 => "400",
            401 => "401",
            403 => "403",
            404 => "404",
            409 => "409",
            500 => "500",
            _ => "other",
        };

        metrics::counter!("http_requests_total", "status" => status_code).increment(1);
        metrics::histogram!("http_request_duration_seconds").record(elapsed.as_secs_f64());

        // 记录日志
        tracing::info!(
            method = %method,
            uri = %uri,
            status = status,
            elapsed_ms = elapsed.as_millis(),
            "Request completed"
        );

        // 在响应头中添加 trace_id
        let mut response = response;
        if let Ok(value) = trace_id.parse() {
            response.headers_mut().insert("x-trace-id", value);
        }
        if let Ok(value) = request_id.parse() {
            response.headers_mut().insert("x-request-id", value);
        }

        response
    }
    .instrument(span);

    REQUEST_CONTEXT.scope(context, handle).await
}

/// 从请求头中提取或生成 trace_id
pub fn extract_or_generate_trace_id(headers: &HeaderMap) -> String {
    headers
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// 获取客户端 IP 地址
/// 支持从代理头获取真实 IP（trust_proxy 开启时）
pub fn get_client_ip(headers: &HeaderMap, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        // 1. 尝试 X-Forwarded-For（可能包含多个 IP，取第一个）
        if let Some(forwarded_for) = headers.get("x-forwarded-for") {
            if let Ok(forwarded_str) = forwarded_for.to_str() {
                if let Some(first_ip) = forwarded_str.split(',').next() {
                    if let Ok(addr) = first_ip.trim().parse::<IpAddr>() {
                        return addr;
                    }
                }
            }
        }

        // 2. 尝试 X-Real-IP
        if let Some(real_ip) = headers.get("x-real-ip") {
            if let Ok(ip_str) = real_ip.to_str() {
                if let Ok(addr) = ip_str.parse::<IpAddr>() {
                    return addr;
                }
            }
        }
    }

    // 无法获取真实 IP，返回本地回环地址（用于测试）
    IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1))
}
