//! 进程内 TTL 缓存
//! 凭证新鲜度缓存与 Webhook 去重缓存共用的共享能力：
//! get/set/delete 带过期时间，支持多请求并发读写，无需调用方加锁

use dashmap::DashMap;
use std::time::{Duration, Instant};

/// 带过期时间的缓存条目
#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// 共享 TTL 缓存
/// DashMap 对同一 key 的冲突写入内部串行化，调用方不需要额外锁
#[derive(Clone, Default)]
pub struct TtlCache {
    entries: std::sync::Arc<DashMap<String, CacheEntry>>,
}

impl TtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取未过期的值；过期条目顺手移除
    pub fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }

        // 已过期：移除后按未命中处理
        self.entries
            .remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// 写入并覆盖，带 TTL
    pub fn set(&self, key: &str, value: &str, ttl: Duration) {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// 删除条目，返回是否存在
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// 仅当 key 不存在（或已过期）时插入，返回是否插入成功
    /// Webhook 去重依赖该操作的原子性：两个并发的相同投递只有一个能插入
    pub fn insert_if_absent(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        let mut inserted = false;

        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| {
            inserted = true;
            CacheEntry {
                value: value.to_string(),
                expires_at: now + ttl,
            }
        });

        // 已有条目但已过期：等同不存在，覆盖
        if !inserted && entry.is_expired(now) {
            *entry = CacheEntry {
                value: value.to_string(),
                expires_at: now + ttl,
            };
            inserted = true;
        }

        inserted
    }

    /// 清理所有过期条目（由后台任务周期调用）
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 凭证新鲜度缓存的 key
pub fn user_version_key(principal_id: &uuid::Uuid) -> String {
    format!("user_version:{}", principal_id)
}

/// Webhook 去重缓存的 key
pub fn webhook_dedup_key(fingerprint_hex: &str) -> String {
    format!("dropboxsign:webhook:{}", fingerprint_hex)
}
