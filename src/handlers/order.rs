//! 服务工单的 HTTP 处理器
//! 所有写入都走乐观并发控制：版本不匹配返回 409，由客户端携带最新版本重试

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::audit::{AuditEvent, AuditKind},
    models::order::*,
    repository::order_repo::OrderRepository,
};
use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// 列出工单
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<OrderFilters>,
) -> Result<impl IntoResponse, AppError> {
    let repo = OrderRepository::new(state.db.clone());
    let orders = repo.list(&filters).await?;

    Ok(Json(json!({
        "orders": orders,
        "count": orders.len()
    })))
}

/// 创建工单
pub async fn create_order(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let repo = OrderRepository::new(state.db.clone());
    let order = repo.create(&req, auth_context.principal_id).await?;

    // 变更审计
    state.audit_service.record(AuditEvent::new(
        AuditKind::EntityMutated,
        auth_context.principal_id,
        &format!("service_order:{}", order.id),
        &format!("Created order: {}", order.order_no),
    ));

    Ok(Json(json!({
        "message": "工单创建成功",
        "order": order
    })))
}

/// 获取工单详情（响应携带当前版本号，供后续条件写入使用）
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let repo = OrderRepository::new(state.db.clone());
    let order = repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Order not found"))?;

    Ok(Json(json!({ "order": order })))
}

/// 更新工单（条件写入）
pub async fn update_order(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let repo = OrderRepository::new(state.db.clone());
    let outcome = repo.update(id, &req).await?;
    let new_version = outcome.require_applied("service order")?;

    // 变更审计
    state.audit_service.record(AuditEvent::new(
        AuditKind::EntityMutated,
        auth_context.principal_id,
        &format!("service_order:{}", id),
        &format!("Updated order (version {})", new_version),
    ));

    Ok(Json(json!({
        "message": "工单更新成功",
        "version": new_version
    })))
}

/// 删除工单（软删除，相同的版本守卫）
pub async fn delete_order(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<DeleteOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let repo = OrderRepository::new(state.db.clone());
    let outcome = repo
        .soft_delete(id, req.expected_version, auth_context.principal_id)
        .await?;
    let new_version = outcome.require_applied("service order")?;

    // 变更审计
    state.audit_service.record(AuditEvent::new(
        AuditKind::EntityMutated,
        auth_context.principal_id,
        &format!("service_order:{}", id),
        &format!("Deleted order (version {})", new_version),
    ));

    Ok(Json(json!({
        "message": "工单删除成功",
        "version": new_version
    })))
}
