//! Role repository (角色数据访问)
//! 所有查询均排除软删除的行；角色写入走条件更新（版本号守卫）

use crate::{concurrency::WriteOutcome, error::AppError, models::role::*};
use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

pub struct RoleRepository {
    db: PgPool,
}

impl RoleRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ==================== Roles ====================

    /// 列出所有未删除的角色
    pub async fn list(&self) -> Result<Vec<Role>, AppError> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE deleted_at IS NULL ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(roles)
    }

    /// 根据 ID 查找未删除的角色
    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<Role>, AppError> {
        let role = sqlx::query_as::<_, Role>(
            "SELECT * FROM roles WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(role)
    }

    /// 创建角色并挂载初始权限
    pub async fn create(&self, req: &CreateRoleRequest) -> Result<Role, AppError> {
        let mut tx = self.db.begin().await?;

        let role = sqlx::query_as::<_, Role>(
            r#"
            INSERT INTO roles (name, description)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(&req.name)
        .bind(&req.description)
        .fetch_one(&mut *tx)
        .await?;

        for code in &req.permission_codes {
            let attached = sqlx::query(
                r#"
                INSERT INTO role_permissions (role_id, permission_id)
                SELECT $1, id FROM permissions WHERE code = $2 AND deleted_at IS NULL
                "#,
            )
            .bind(role.id)
            .bind(code)
            .execute(&mut *tx)
            .await?;

            if attached.rows_affected() == 0 {
                return Err(AppError::validation(&format!("Unknown permission code: {}", code)));
            }
        }

        tx.commit().await?;
        Ok(role)
    }

    /// 软删除角色（条件写入：版本号必须匹配，且无任何活跃绑定）
    /// 活跃绑定守卫折叠进同一条 UPDATE，与版本检查一起原子生效
    pub async fn soft_delete(
        &self,
        id: Uuid,
        expected_version: i64,
        deleted_by: Uuid,
    ) -> Result<WriteOutcome, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE roles
            SET deleted_at = NOW(), deleted_by = $3,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2 AND deleted_at IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM role_assignments ra
                  WHERE ra.role_id = roles.id AND ra.deleted_at IS NULL
              )
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(deleted_by)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            // 失败分类仅用于报告，真正的守卫在上面的条件更新里
            let Some(_role) = self.find_by_id(&id).await? else {
                return Ok(WriteOutcome::NotFound);
            };

            let active_assignments: i64 = sqlx::query(
                "SELECT COUNT(*) AS cnt FROM role_assignments WHERE role_id = $1 AND deleted_at IS NULL",
            )
            .bind(id)
            .fetch_one(&self.db)
            .await?
            .get("cnt");

            if active_assignments > 0 {
                return Err(AppError::BadRequest(
                    "Role is still assigned to principals and cannot be deleted".to_string(),
                ));
            }

            return Ok(WriteOutcome::Conflict);
        }

        Ok(WriteOutcome::Applied {
            new_version: expected_version + 1,
        })
    }

    // ==================== Permissions ====================

    /// 列出权限目录（未删除）
    pub async fn list_permissions(&self) -> Result<Vec<Permission>, AppError> {
        let permissions = sqlx::query_as::<_, Permission>(
            "SELECT id, code, kind, description FROM permissions WHERE deleted_at IS NULL ORDER BY code",
        )
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    /// 主体的有效权限集：所有活跃角色的活跃权限的并集
    /// 未知主体返回空集（不是错误）；数据源故障向上传播（失败关闭）
    pub async fn effective_permissions(
        &self,
        principal_id: Uuid,
    ) -> Result<Vec<Permission>, AppError> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT DISTINCT p.id, p.code, p.kind, p.description
            FROM permissions p
            JOIN role_permissions rp ON rp.permission_id = p.id
            JOIN roles r ON r.id = rp.role_id
            JOIN role_assignments ra ON ra.role_id = r.id
            WHERE ra.principal_id = $1
              AND ra.deleted_at IS NULL
              AND r.deleted_at IS NULL
              AND p.deleted_at IS NULL
            ORDER BY p.code
            "#,
        )
        .bind(principal_id)
        .fetch_all(&self.db)
        .await?;

        Ok(permissions)
    }

    /// 主体是否持有指定权限码（精确匹配）
    pub async fn principal_has_permission(
        &self,
        principal_id: Uuid,
        code: &str,
    ) -> Result<bool, AppError> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM permissions p
                JOIN role_permissions rp ON rp.permission_id = p.id
                JOIN roles r ON r.id = rp.role_id
                JOIN role_assignments ra ON ra.role_id = r.id
                WHERE ra.principal_id = $1
                  AND p.code = $2
                  AND ra.deleted_at IS NULL
                  AND r.deleted_at IS NULL
                  AND p.deleted_at IS NULL
            ) AS has_permission
            "#,
        )
        .bind(principal_id)
        .bind(code)
        .fetch_one(&self.db)
        .await?;

        Ok(row.get("has_permission"))
    }

    // ==================== Role assignments ====================

    /// 在事务中创建角色绑定
    /// 调用方负责在同一事务内递增主体版本号
    pub async fn assign_role_tx(
        tx: &mut Transaction<'_, Postgres>,
        principal_id: Uuid,
        role_id: Uuid,
        assigned_by: Uuid,
    ) -> Result<RoleAssignment, AppError> {
        // 同一 (principal, role) 的活跃绑定不允许重复
        let existing = sqlx::query(
            r#"
            SELECT id FROM role_assignments
            WHERE principal_id = $1 AND role_id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(principal_id)
        .bind(role_id)
        .fetch_optional(&mut **tx)
        .await?;

        if existing.is_some() {
            return Err(AppError::BadRequest("Role already assigned".to_string()));
        }

        let assignment = sqlx::query_as::<_, RoleAssignment>(
            r#"
            INSERT INTO role_assignments (principal_id, role_id, assigned_at, assigned_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(principal_id)
        .bind(role_id)
        .bind(Utc::now())
        .bind(assigned_by)
        .fetch_one(&mut **tx)
        .await?;

        Ok(assignment)
    }

    /// 在事务中软删除角色绑定，返回被撤销绑定所属的主体
    pub async fn revoke_assignment_tx(
        tx: &mut Transaction<'_, Postgres>,
        assignment_id: Uuid,
        deleted_by: Uuid,
    ) -> Result<Option<Uuid>, AppError> {
        let row = sqlx::query(
            r#"
            UPDATE role_assignments
            SET deleted_at = NOW(), deleted_by = $2
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING principal_id
            "#,
        )
        .bind(assignment_id)
        .bind(deleted_by)
        .fetch_optional(&mut **tx)
        .await?;

        Ok(row.map(|r| r.get("principal_id")))
    }
}
