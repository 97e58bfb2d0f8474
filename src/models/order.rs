//! Service order domain models
//! 带版本号的业务实体：每次成功写入版本 +1，写入必须携带期望版本

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Service order
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ServiceOrder {
    pub id: Uuid,
    pub order_no: String,
    pub customer_name: String,
    pub status: String,
    pub notes: Option<String>,
    pub version: i64,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<Uuid>,
}

/// Create order request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, max = 100))]
    pub order_no: String,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: String,
    pub notes: Option<String>,
}

/// Update order request（条件写入，expected_version 必填）
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOrderRequest {
    pub expected_version: i64,
    #[validate(length(min = 1, max = 200))]
    pub customer_name: Option<String>,
    #[validate(length(min = 1, max = 50))]
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Soft-delete order request
#[derive(Debug, Deserialize)]
pub struct DeleteOrderRequest {
    pub expected_version: i64,
}

/// Order list filters
#[derive(Debug, Deserialize)]
pub struct OrderFilters {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}
