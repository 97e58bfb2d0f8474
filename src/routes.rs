//! 路由注册
//! 路由按管线分组：公开端点、Webhook 验真管线、认证管线。
//! 每条受保护路由所需的权限码在 ROUTE_PERMISSIONS 中以普通数据声明，
//! 由授权门统一执行，处理器内不再重复判权。

use axum::{
    routing::{delete, get, post},
    Router,
};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    auth::middleware::{
        authorization_middleware, jwt_auth_middleware, token_freshness_middleware,
    },
    auth::webhook::webhook_auth_middleware,
    handlers,
    middleware::AppState,
};

/// 路由 → 所需权限码
/// 键为 (HTTP 方法, 路由模板)；未列出的路由不做权限检查
static ROUTE_PERMISSIONS: Lazy<HashMap<(&'static str, &'static str), &'static str>> =
    Lazy::new(|| {
        HashMap::from([
            // 工单
            (("GET", "/api/v1/orders"), "order.read"),
            (("POST", "/api/v1/orders"), "order.create"),
            (("GET", "/api/v1/orders/{id}"), "order.read"),
            (("PUT", "/api/v1/orders/{id}"), "order.update"),
            (("DELETE", "/api/v1/orders/{id}"), "order.delete"),
            // 角色与权限
            (("GET", "/api/v1/roles"), "role.read"),
            (("POST", "/api/v1/roles"), "role.manage"),
            (("GET", "/api/v1/roles/{id}"), "role.read"),
            (("DELETE", "/api/v1/roles/{id}"), "role.manage"),
            (("GET", "/api/v1/permissions"), "role.read"),
            (("POST", "/api/v1/role-assignments"), "role.manage"),
            (("DELETE", "/api/v1/role-assignments/{id}"), "role.manage"),
            // 审计检视
            (("GET", "/api/v1/audit/events"), "audit.read"),
        ])
    });

/// 查询路由声明的所需权限码
pub fn required_permission(method: &str, path: &str) -> Option<&'static str> {
    ROUTE_PERMISSIONS.get(&(method, path)).copied()
}

/// 创建应用路由
pub fn create_router(state: Arc<AppState>) -> Router {
    // 公开端点（健康检查）
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/ready", get(handlers::health::readiness_check));

    // Webhook 路由：独立验真管线，不经过 JWT/权限门
    let webhook_routes = Router::new()
        .route(
            "/webhooks/dropbox-sign",
            post(handlers::sign_webhook::receive_sign_event),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.webhook_gate.clone(),
            webhook_auth_middleware,
        ));

    // 认证管线：JWT 认证 → 凭证新鲜度 → 授权
    // layer 后添加者先执行，故按相反顺序挂载
    let authenticated_routes = Router::new()
        // 工单
        .route(
            "/api/v1/orders",
            get(handlers::order::list_orders).post(handlers::order::create_order),
        )
        .route(
            "/api/v1/orders/{id}",
            get(handlers::order::get_order)
                .put(handlers::order::update_order)
                .delete(handlers::order::delete_order),
        )
        // 角色管理
        .route(
            "/api/v1/roles",
            get(handlers::role::list_roles).post(handlers::role::create_role),
        )
        .route(
            "/api/v1/roles/{id}",
            get(handlers::role::get_role).delete(handlers::role::delete_role),
        )
        .route("/api/v1/permissions", get(handlers::role::list_permissions))
        // 自省：任何已认证主体都可以查看自己的有效权限集
        .route(
            "/api/v1/permissions/me",
            get(handlers::role::get_my_permissions),
        )
        .route(
            "/api/v1/role-assignments",
            post(handlers::role::assign_role),
        )
        .route(
            "/api/v1/role-assignments/{id}",
            delete(handlers::role::revoke_role),
        )
        // 审计检视
        .route(
            "/api/v1/audit/events",
            get(handlers::audit::list_audit_events),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            authorization_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            token_freshness_middleware,
        ))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(webhook_routes)
        .merge(authenticated_routes)
        .layer(axum::middleware::from_fn(
            crate::middleware::request_tracking_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_permission_lookup() {
        assert_eq!(
            required_permission("DELETE", "/api/v1/orders/{id}"),
            Some("order.delete")
        );
        assert_eq!(
            required_permission("POST", "/api/v1/roles"),
            Some("role.manage")
        );
        // 自省接口不做权限检查
        assert_eq!(required_permission("GET", "/api/v1/permissions/me"), None);
        // 健康检查不在表内
        assert_eq!(required_permission("GET", "/health"), None);
    }
}
