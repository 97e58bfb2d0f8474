//! Audit repository (审计数据访问)
//! 追加写，不更新不删除

use crate::{error::AppError, models::audit::*};
use sqlx::PgPool;

pub struct AuditRepository {
    db: PgPool,
}

impl AuditRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 插入审计事件
    pub async fn insert(&self, event: &AuditEvent) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO audit_events (
                id, kind, principal_id, resource, reason,
                source_ip, user_agent, trace_id, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(event.id)
        .bind(&event.kind)
        .bind(event.principal_id)
        .bind(&event.resource)
        .bind(&event.reason)
        .bind(&event.source_ip)
        .bind(&event.user_agent)
        .bind(&event.trace_id)
        .bind(event.occurred_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    /// 查询审计事件（管理员检视用）
    pub async fn query(&self, filters: &AuditEventFilters) -> Result<Vec<AuditEvent>, AppError> {
        let limit = filters.limit.unwrap_or(50).clamp(1, 200);
        let offset = filters.offset.unwrap_or(0).max(0);

        let events = sqlx::query_as::<_, AuditEvent>(
            r#"
            SELECT * FROM audit_events
            WHERE ($1::uuid IS NULL OR principal_id = $1)
              AND ($2::text IS NULL OR kind = $2)
              AND ($3::timestamptz IS NULL OR occurred_at >= $3)
              AND ($4::timestamptz IS NULL OR occurred_at <= $4)
            ORDER BY occurred_at DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(filters.principal_id)
        .bind(&filters.kind)
        .bind(filters.start_time)
        .bind(filters.end_time)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.db)
        .await?;

        Ok(events)
    }
}
