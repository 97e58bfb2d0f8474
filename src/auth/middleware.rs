//! 请求门管线：JWT 认证 → 凭证新鲜度 → 授权
//! 三个门在单个请求内按固定顺序执行，互不依赖下游处理器的逻辑；
//! 任何一个门短路即终止，绝不默认放行

use crate::{
    error::AppError,
    middleware::{get_client_ip, AppState},
    models::audit::{AuditEvent, AuditKind},
    routes::required_permission,
    services::FreshnessService,
};
use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use uuid::Uuid;

/// 认证上下文（附加到请求扩展）
/// 由已验证的凭证在请求开始时物化，请求结束即丢弃，本层不持久化
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal_id: Uuid,
    /// 凭证签发时的版本号声明；旧令牌可能缺失
    pub token_version: Option<i64>,
}

// 实现 FromRequestParts 以便在 handler 中直接提取 AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}

/// 从 Authorization 头提取令牌
pub fn extract_token(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| {
            if s.starts_with("Bearer ") {
                Some(s[7..].to_string())
            } else {
                None
            }
        })
        .ok_or(AppError::Unauthorized)
}

/// JWT 认证中间件 - 必须认证
/// 凭证解析不出有效主体 ⇒ 401 终止，不进入后续门
pub async fn jwt_auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 从 Authorization 头提取令牌
    let token = extract_token(req.headers())?;

    // 验证令牌
    let claims = state.jwt_service.validate_token(&token)?;

    // 创建认证上下文
    let principal_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized)?;
    let auth_context = AuthContext {
        principal_id,
        token_version: claims.ver,
    };

    // 附加到请求扩展
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// 凭证新鲜度中间件
/// 令牌里的版本号声明必须与当前版本一致，否则要求重新登录；
/// 借此在授权状态变更（如角色被撤销）后立即废止长生命周期凭证
pub async fn token_freshness_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // 仅对已认证请求生效；未认证请求原样放行（由后续门处置）
    let Some(auth_context) = req.extensions().get::<AuthContext>().cloned() else {
        return Ok(next.run(req).await);
    };

    // 版本号声明缺失或无法解析：跳过本门，交给下游授权判断
    let Some(token_version) = auth_context.token_version else {
        tracing::debug!(
            principal_id = %auth_context.principal_id,
            "Token carries no version claim, skipping freshness check"
        );
        return Ok(next.run(req).await);
    };

    let current = state
        .freshness_service
        .current_version(auth_context.principal_id)
        .await?;

    if let Err(e) = FreshnessService::decide(current, token_version) {
        metrics::counter!("credential_stale_total").increment(1);
        tracing::info!(
            principal_id = %auth_context.principal_id,
            token_version = token_version,
            current_version = ?current,
            "Stale credential rejected"
        );
        return Err(e);
    }

    Ok(next.run(req).await)
}

/// 授权中间件
/// 路由声明的所需权限码由路由层解析为普通数据；未声明的路由直接通过
pub async fn authorization_middleware(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let matched_path = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());

    // 路由未声明权限要求 ⇒ 直接通过
    let Some(code) = required_permission(req.method().as_str(), &matched_path) else {
        return Ok(next.run(req).await);
    };

    // 凭证未产出有效主体 ⇒ 401 终止
    let Some(auth_context) = req.extensions().get::<AuthContext>().cloned() else {
        return Err(AppError::Unauthorized);
    };

    // 评估失败向上传播（500）：失败关闭，绝不默认放行
    let granted = state
        .permission_service
        .has_permission(auth_context.principal_id, code)
        .await?;

    let resource = format!("{} {}", req.method(), matched_path);

    if !granted {
        metrics::counter!("authz_denied_total").increment(1);

        // 拒绝审计相对响应是"发射后不管"：入队失败也不影响本次响应
        // trace_id 取追踪中间件写入的上下文，与响应头里的 x-trace-id 一致
        let trace_id = req
            .extensions()
            .get::<crate::middleware::RequestContext>()
            .map(|ctx| ctx.trace_id.clone());
        let headers = req.headers();
        let event = AuditEvent::new(
            AuditKind::AuthDenied,
            auth_context.principal_id,
            &resource,
            &format!("missing permission: {}", code),
        )
        .with_request_context(
            Some(get_client_ip(headers, state.config.security.trust_proxy).to_string()),
            headers
                .get("user-agent")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string()),
            trace_id,
        );
        state.audit_service.record(event);

        tracing::warn!(
            principal_id = %auth_context.principal_id,
            resource = %resource,
            permission = %code,
            "Authorization denied"
        );
        return Err(AppError::Forbidden);
    }

    tracing::debug!(
        principal_id = %auth_context.principal_id,
        resource = %resource,
        permission = %code,
        "Authorization granted"
    );

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_token_valid() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer test_token_123".parse().unwrap());

        let token = extract_token(&headers).unwrap();
        assert_eq!(token, "test_token_123");
    }

    #[test]
    fn test_extract_token_missing() {
        let headers = HeaderMap::new();
        assert!(extract_token(&headers).is_err());
    }

    #[test]
    fn test_extract_token_invalid_format() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "InvalidFormat".parse().unwrap());

        assert!(extract_token(&headers).is_err());
    }
}
