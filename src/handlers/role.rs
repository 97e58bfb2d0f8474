//! 角色与权限管理的 HTTP 处理器
//! 路由权限由授权门统一执行，此处只做业务逻辑与变更审计。
//! 任何改变主体有效权限集的操作（分配/撤销角色）都在同一事务内
//! 递增主体版本号，提交后同步失效新鲜度缓存。

use crate::{
    auth::middleware::AuthContext,
    error::AppError,
    middleware::AppState,
    models::audit::{AuditEvent, AuditKind},
    models::role::*,
    repository::role_repo::RoleRepository,
    services::FreshnessService,
};
use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

// ==================== Roles ====================

/// 列出所有角色
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let repo = RoleRepository::new(state.db.clone());
    let roles = repo.list().await?;

    Ok(Json(json!({
        "roles": roles,
        "count": roles.len()
    })))
}

/// 创建角色
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<CreateRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;

    let repo = RoleRepository::new(state.db.clone());
    let role = repo.create(&req).await?;

    // 变更审计
    state.audit_service.record(AuditEvent::new(
        AuditKind::EntityMutated,
        auth_context.principal_id,
        &format!("role:{}", role.id),
        &format!("Created role: {}", role.name),
    ));

    Ok(Json(json!({
        "message": "角色创建成功",
        "role": role
    })))
}

/// 获取角色详情
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let repo = RoleRepository::new(state.db.clone());
    let role = repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found("Role not found"))?;

    Ok(Json(json!({ "role": role })))
}

/// 删除角色（软删除，版本号守卫）
/// 仍有活跃绑定的角色拒绝删除；版本不匹配返回 409
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(id): Path<Uuid>,
    Json(req): Json<DeleteRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let repo = RoleRepository::new(state.db.clone());

    let outcome = repo
        .soft_delete(id, req.expected_version, auth_context.principal_id)
        .await?;
    let new_version = outcome.require_applied("role")?;

    // 变更审计
    state.audit_service.record(AuditEvent::new(
        AuditKind::EntityMutated,
        auth_context.principal_id,
        &format!("role:{}", id),
        &format!("Deleted role (version {})", new_version),
    ));

    Ok(Json(json!({
        "message": "角色删除成功",
        "version": new_version
    })))
}

// ==================== Permissions ====================

/// 列出权限目录
pub async fn list_permissions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, AppError> {
    let repo = RoleRepository::new(state.db.clone());
    let permissions = repo.list_permissions().await?;

    Ok(Json(json!({
        "permissions": permissions,
        "count": permissions.len()
    })))
}

/// 当前主体的有效权限集（自省接口）
pub async fn get_my_permissions(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
) -> Result<impl IntoResponse, AppError> {
    let permissions = state
        .permission_service
        .effective_permissions(auth_context.principal_id)
        .await?;

    Ok(Json(json!({
        "principal_id": auth_context.principal_id,
        "permissions": permissions,
        "count": permissions.len()
    })))
}

// ==================== Role assignments ====================

/// 为主体分配角色
/// 绑定写入与版本号递增在同一事务内，提交后同步失效缓存
pub async fn assign_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Json(req): Json<AssignRoleRequest>,
) -> Result<impl IntoResponse, AppError> {
    let repo = RoleRepository::new(state.db.clone());

    // 角色必须存在且未删除
    let role = repo
        .find_by_id(&req.role_id)
        .await?
        .ok_or_else(|| AppError::not_found("Role not found"))?;

    let mut tx = state.db.begin().await?;
    let assignment = RoleRepository::assign_role_tx(
        &mut tx,
        req.principal_id,
        req.role_id,
        auth_context.principal_id,
    )
    .await?;
    let new_version = FreshnessService::bump_version_tx(&mut tx, req.principal_id).await?;
    tx.commit().await?;

    // 提交后立即失效：已发放凭证携带的旧版本号在下一次请求即被拒绝
    state.freshness_service.invalidate(req.principal_id);

    // 变更审计
    state.audit_service.record(AuditEvent::new(
        AuditKind::EntityMutated,
        auth_context.principal_id,
        &format!("role_assignment:{}", assignment.id),
        &format!(
            "Assigned role {} to principal {} (principal version {})",
            role.name, req.principal_id, new_version
        ),
    ));

    Ok(Json(json!({
        "message": "角色分配成功",
        "assignment": assignment,
        "principal_version": new_version
    })))
}

/// 撤销角色绑定
pub async fn revoke_role(
    State(state): State<Arc<AppState>>,
    auth_context: AuthContext,
    Path(assignment_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = state.db.begin().await?;

    let principal_id =
        RoleRepository::revoke_assignment_tx(&mut tx, assignment_id, auth_context.principal_id)
            .await?
            .ok_or_else(|| AppError::not_found("Role assignment not found"))?;

    let new_version = FreshnessService::bump_version_tx(&mut tx, principal_id).await?;
    tx.commit().await?;

    state.freshness_service.invalidate(principal_id);

    // 变更审计
    state.audit_service.record(AuditEvent::new(
        AuditKind::EntityMutated,
        auth_context.principal_id,
        &format!("role_assignment:{}", assignment_id),
        &format!(
            "Revoked role assignment for principal {} (principal version {})",
            principal_id, new_version
        ),
    ));

    Ok(Json(json!({
        "message": "角色撤销成功",
        "principal_version": new_version
    })))
}
