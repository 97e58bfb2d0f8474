//! 权限评估服务
//! 有效权限集 = 主体所有活跃角色的活跃权限的并集；权限码精确匹配

use crate::{error::AppError, models::role::Permission, repository::role_repo::RoleRepository};
use sqlx::PgPool;
use uuid::Uuid;

pub struct PermissionService {
    db: PgPool,
}

impl PermissionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 主体是否持有指定权限码
    /// 未知主体 ⇒ false（空集成员判定）；数据源故障 ⇒ 传播错误，绝不默认放行
    pub async fn has_permission(&self, principal_id: Uuid, code: &str) -> Result<bool, AppError> {
        let role_repo = RoleRepository::new(self.db.clone());
        role_repo.principal_has_permission(principal_id, code).await
    }

    /// 主体的完整有效权限集（供个人资料/自省接口使用）
    pub async fn effective_permissions(
        &self,
        principal_id: Uuid,
    ) -> Result<Vec<Permission>, AppError> {
        let role_repo = RoleRepository::new(self.db.clone());
        role_repo.effective_permissions(principal_id).await
    }

    /// 检查权限，如果无权限则返回错误
    /// 读路径无副作用：拒绝的审计由调用方（授权门）负责
    pub async fn require_permission(
        &self,
        principal_id: Uuid,
        code: &str,
    ) -> Result<(), AppError> {
        let granted = self.has_permission(principal_id, code).await?;

        if !granted {
            tracing::warn!(
                principal_id = %principal_id,
                permission = %code,
                "Permission denied"
            );
            return Err(AppError::Forbidden);
        }

        Ok(())
    }
}
