//! 版本存储 (Version Store)
//! 每个实体一个单调递增的整数计数器，作为凭证新鲜度判定的事实来源。
//! 递增是单条原子语句，不依赖应用层锁。

use crate::error::AppError;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

/// 主体类凭证版本的实体类型
pub const ENTITY_PRINCIPAL: &str = "principal";

pub struct VersionStore {
    db: PgPool,
}

impl VersionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// 读取当前版本；实体不存在返回 None
    pub async fn current_version(
        &self,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<Option<i64>, AppError> {
        let row = sqlx::query(
            "SELECT version FROM principal_versions WHERE entity_type = $1 AND entity_id = $2",
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(|r| r.get("version")))
    }

    /// 在事务中递增版本号并返回新值
    /// 首次出现的实体从 1 开始计数（行不存在时插入）
    pub async fn bump_version_tx(
        tx: &mut Transaction<'_, Postgres>,
        entity_type: &str,
        entity_id: Uuid,
    ) -> Result<i64, AppError> {
        let row = sqlx::query(
            r#"
            INSERT INTO principal_versions (entity_type, entity_id, version, updated_at)
            VALUES ($1, $2, 1, NOW())
            ON CONFLICT (entity_type, entity_id)
            DO UPDATE SET version = principal_versions.version + 1, updated_at = NOW()
            RETURNING version
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .fetch_one(&mut **tx)
        .await?;

        Ok(row.get("version"))
    }
}
