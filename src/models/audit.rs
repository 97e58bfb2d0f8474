//! Audit domain models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 审计事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditKind {
    /// 授权失败（已知主体缺少权限）
    AuthDenied,
    /// 实体成功变更
    EntityMutated,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditKind::AuthDenied => "auth.denied",
            AuditKind::EntityMutated => "entity.mutated",
        }
    }
}

/// 追加写审计事件
/// 本服务只写不读（查询接口仅供管理员检视），绝不修改或删除
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AuditEvent {
    pub id: Uuid,
    pub kind: String,
    pub principal_id: Uuid,
    /// 被访问的资源，例如 "POST /api/v1/orders"
    pub resource: String,
    /// 失败原因或变更摘要，例如 "missing permission: order.delete"
    pub reason: Option<String>,
    pub source_ip: Option<String>,
    pub user_agent: Option<String>,
    pub trace_id: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(kind: AuditKind, principal_id: Uuid, resource: &str, reason: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: kind.as_str().to_string(),
            principal_id,
            resource: resource.to_string(),
            reason: Some(reason.to_string()),
            source_ip: None,
            user_agent: None,
            trace_id: None,
            occurred_at: Utc::now(),
        }
    }

    pub fn with_request_context(
        mut self,
        source_ip: Option<String>,
        user_agent: Option<String>,
        trace_id: Option<String>,
    ) -> Self {
        self.source_ip = source_ip;
        self.user_agent = user_agent;
        self.trace_id = trace_id;
        self
    }
}

/// Audit log filters
#[derive(Debug, Deserialize)]
pub struct AuditEventFilters {
    pub principal_id: Option<Uuid>,
    pub kind: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
