//! 审计日志检视处理器
//! 审计表追加写，此接口只读

use crate::{
    error::AppError, middleware::AppState, models::audit::AuditEventFilters,
    repository::audit_repo::AuditRepository,
};
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde_json::json;
use std::sync::Arc;

/// 查询审计事件
pub async fn list_audit_events(
    State(state): State<Arc<AppState>>,
    Query(filters): Query<AuditEventFilters>,
) -> Result<impl IntoResponse, AppError> {
    let repo = AuditRepository::new(state.db.clone());
    let events = repo.query(&filters).await?;

    Ok(Json(json!({
        "events": events,
        "count": events.len()
    })))
}
