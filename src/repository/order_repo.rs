//! Service order repository (服务工单数据访问)
//! 所有变更（含软删除）都是单条条件更新：
//! WHERE version = 期望版本，命中则字段更新且 version + 1，未命中则存储不变

use crate::{concurrency::WriteOutcome, error::AppError, models::order::*};
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct OrderRepository {
    db: PgPool,
}

impl OrderRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 列出未删除的工单
    pub async fn list(&self, filters: &OrderFilters) -> Result<Vec<ServiceOrder>, AppError> {
        let limit = filters.limit.unwrap_or(50).clamp(1, 200);
        let offset = filters.offset.unwrap_or(0).max(0);

        let orders = sqlx::query_as::<_, ServiceOrder>(
            r#"
            SELECT * FROM service_orders
            WHERE deleted_at IS NULL
              AND ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(&filters.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(orders)
    }

    /// 根据 ID 查找未删除的工单
    pub async fn find_by_id(&self, id: &Uuid) -> Result<Option<ServiceOrder>, AppError> {
        let order = sqlx::query_as::<_, ServiceOrder>(
            "SELECT * FROM service_orders WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;

        Ok(order)
    }

    /// 创建工单，版本号从 1 开始
    pub async fn create(
        &self,
        req: &CreateOrderRequest,
        created_by: Uuid,
    ) -> Result<ServiceOrder, AppError> {
        let order = sqlx::query_as::<_, ServiceOrder>(
            r#"
            INSERT INTO service_orders (order_no, customer_name, notes, created_by)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&req.order_no)
        .bind(&req.customer_name)
        .bind(&req.notes)
        .bind(created_by)
        .fetch_one(&self.db)
        .await?;

        Ok(order)
    }

    /// 条件更新：存储版本等于期望版本时应用变更并 +1，原子执行
    pub async fn update(
        &self,
        id: Uuid,
        req: &UpdateOrderRequest,
    ) -> Result<WriteOutcome, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE service_orders
            SET customer_name = COALESCE($3, customer_name),
                status = COALESCE($4, status),
                notes = COALESCE($5, notes),
                version = version + 1,
                updated_at = NOW()
            WHERE id = $1 AND version = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(req.expected_version)
        .bind(&req.customer_name)
        .bind(&req.status)
        .bind(&req.notes)
        .execute(&self.db)
        .await?;

        let still_exists = self.exists_active(id).await?;
        Ok(WriteOutcome::resolve(result.rows_affected(), req.expected_version, still_exists))
    }

    /// 软删除：与普通变更同样的版本守卫，版本同样 +1
    /// 与刚删除记录竞争的更新会得到 Conflict/NotFound，绝不悄悄复活字段
    pub async fn soft_delete(
        &self,
        id: Uuid,
        expected_version: i64,
        deleted_by: Uuid,
    ) -> Result<WriteOutcome, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE service_orders
            SET deleted_at = NOW(), deleted_by = $3,
                version = version + 1, updated_at = NOW()
            WHERE id = $1 AND version = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(expected_version)
        .bind(deleted_by)
        .execute(&self.db)
        .await?;

        let still_exists = self.exists_active(id).await?;
        Ok(WriteOutcome::resolve(result.rows_affected(), expected_version, still_exists))
    }

    /// 存在性探测：区分 Conflict 与 NotFound
    async fn exists_active(&self, id: Uuid) -> Result<bool, AppError> {
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM service_orders WHERE id = $1 AND deleted_at IS NULL) AS present",
        )
        .bind(id)
        .fetch_one(&self.db)
        .await?;

        Ok(row.get("present"))
    }
}
