//! 凭证新鲜度服务
//! 缓存短路版本号查询；未命中时回源版本存储并写入 5 分钟 TTL。
//! 任何改变主体授权状态的变更都必须递增版本号并同步删除缓存条目。

use crate::{
    cache::{user_version_key, TtlCache},
    error::AppError,
    repository::version_repo::{VersionStore, ENTITY_PRINCIPAL},
};
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

pub struct FreshnessService {
    version_store: VersionStore,
    cache: Arc<TtlCache>,
    ttl: Duration,
}

impl FreshnessService {
    pub fn new(db: PgPool, cache: Arc<TtlCache>, ttl_secs: u64) -> Self {
        Self {
            version_store: VersionStore::new(db),
            cache,
            ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// 解析主体的当前版本号
    /// 缓存命中直接返回；未命中回源并填充缓存；主体不存在返回 None
    pub async fn current_version(&self, principal_id: Uuid) -> Result<Option<i64>, AppError> {
        let key = user_version_key(&principal_id);

        if let Some(cached) = self.cache.get(&key) {
            if let Ok(version) = cached.parse::<i64>() {
                return Ok(Some(version));
            }
            // 缓存值损坏：删除后回源
            self.cache.delete(&key);
        }

        let version = self
            .version_store
            .current_version(ENTITY_PRINCIPAL, principal_id)
            .await?;

        if let Some(v) = version {
            self.cache.set(&key, &v.to_string(), self.ttl);
        }

        Ok(version)
    }

    /// 在调用方事务内递增主体版本号，返回新版本
    /// 提交后必须调用 invalidate()，缓存条目不允许在 TTL 之外继续反映旧版本
    pub async fn bump_version_tx(
        tx: &mut Transaction<'_, Postgres>,
        principal_id: Uuid,
    ) -> Result<i64, AppError> {
        VersionStore::bump_version_tx(tx, ENTITY_PRINCIPAL, principal_id).await
    }

    /// 同步删除缓存条目（版本号递增事务提交后立即调用）
    pub fn invalidate(&self, principal_id: Uuid) {
        let key = user_version_key(&principal_id);
        let existed = self.cache.delete(&key);

        tracing::debug!(
            principal_id = %principal_id,
            cache_entry_existed = existed,
            "Freshness cache invalidated"
        );
    }

    /// 新鲜度判定
    /// None ⇒ 主体已不存在；版本不一致 ⇒ 凭证已过时；一致 ⇒ 放行
    pub fn decide(current: Option<i64>, token_version: i64) -> Result<(), AppError> {
        match current {
            None => Err(AppError::credential_stale("Principal no longer exists")),
            Some(v) if v != token_version => {
                Err(AppError::credential_stale("Credential is stale"))
            }
            Some(_) => Ok(()),
        }
    }
}
