//! 统一错误模型
//! 定义所有错误类型和错误响应格式

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

/// 应用错误类型
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    /// 未能从凭证解析出有效主体
    #[error("Authentication failed")]
    Unauthorized,

    #[error("Authentication error: {0}")]
    Authentication(String),

    /// 已知主体缺少所需权限
    #[error("Access denied")]
    Forbidden,

    /// 凭证中的版本号与当前授权状态不一致，需要重新登录
    #[error("Credential stale: {0}")]
    CredentialStale(String),

    /// 乐观并发冲突：期望版本与存储版本不一致
    #[error("Version conflict on {0}")]
    VersionConflict(String),

    #[error("Webhook authentication failed: {0}")]
    WebhookUnauthenticated(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Authentication(_) => StatusCode::UNAUTHORIZED,
            AppError::CredentialStale(_) => StatusCode::UNAUTHORIZED,
            AppError::WebhookUnauthenticated(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::VersionConflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Config(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// 稳定的机器可读错误码
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Unauthorized | AppError::Authentication(_) => "AUTHENTICATION_MISSING",
            AppError::Forbidden => "AUTHORIZATION_DENIED",
            AppError::CredentialStale(_) => "CREDENTIAL_STALE",
            AppError::VersionConflict(_) => "CONCURRENCY_CONFLICT",
            AppError::WebhookUnauthenticated(_) => "WEBHOOK_UNAUTHENTICATED",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Validation(_) => "VALIDATION_FAILED",
            // 数据源故障按失败关闭处理：绝不视为隐式授权
            AppError::Database(_) => "EVALUATION_FAILURE",
            AppError::Config(_) | AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// 获取用户友好的错误消息（不包含敏感信息）
    pub fn user_message(&self) -> String {
        match self {
            AppError::Unauthorized => "Authentication failed".to_string(),
            AppError::Authentication(msg) => msg.clone(),
            AppError::Forbidden => "Access denied".to_string(),
            AppError::CredentialStale(msg) => {
                format!("{}. Please re-authenticate", msg)
            }
            AppError::VersionConflict(entity) => format!(
                "{} was modified concurrently. Reload the latest version and retry",
                entity
            ),
            AppError::WebhookUnauthenticated(msg) => msg.clone(),
            AppError::NotFound(msg) => format!("Resource not found: {}", msg),
            AppError::BadRequest(msg) => msg.clone(),
            AppError::Validation(msg) => msg.clone(),
            AppError::Database(_) => "Database error occurred".to_string(),
            AppError::Config(_) => "Configuration error".to_string(),
            AppError::Internal(msg) => format!("Internal server error: {}", msg),
        }
    }

    // 便捷方法
    pub fn not_found(msg: &str) -> Self {
        AppError::NotFound(msg.to_string())
    }

    pub fn validation(msg: &str) -> Self {
        AppError::Validation(msg.to_string())
    }

    pub fn authentication(msg: &str) -> Self {
        AppError::Authentication(msg.to_string())
    }

    pub fn credential_stale(msg: &str) -> Self {
        AppError::CredentialStale(msg.to_string())
    }

    pub fn webhook_unauthenticated(msg: &str) -> Self {
        AppError::WebhookUnauthenticated(msg.to_string())
    }

    pub fn internal_error(msg: &str) -> Self {
        AppError::Internal(msg.to_string())
    }
}

/// 错误响应 DTO
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    pub request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        // 使用追踪中间件分配的 request_id，响应体与 x-request-id 响应头保持一致
        let request_id = crate::middleware::RequestContext::current()
            .map(|ctx| ctx.request_id)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let error_response = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code(),
                message: self.user_message(),
                request_id,
            },
        };

        // 记录错误日志
        tracing::error!(
            code = self.error_code(),
            status = status.as_u16(),
            message = %self,
            request_id = %error_response.error.request_id,
            "Application error"
        );

        (status, Json(error_response)).into_response()
    }
}

/// 从 String 转换为 AppError::Config
impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError::Config(s)
    }
}

/// 从 config::ConfigError 转换
impl From<config::ConfigError> for AppError {
    fn from(e: config::ConfigError) -> Self {
        AppError::Config(e.to_string())
    }
}

/// 从 validator::ValidationErrors 转换
impl From<validator::ValidationErrors> for AppError {
    fn from(e: validator::ValidationErrors) -> Self {
        AppError::Validation(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::CredentialStale("credential stale".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::VersionConflict("service order".to_string()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::NotFound("test".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_error_codes_are_stable() {
        // 客户端依赖这些错误码区分"重新登录"与"缺少权限"
        assert_eq!(
            AppError::CredentialStale("x".to_string()).error_code(),
            "CREDENTIAL_STALE"
        );
        assert_eq!(AppError::Forbidden.error_code(), "AUTHORIZATION_DENIED");
        assert_eq!(
            AppError::VersionConflict("x".to_string()).error_code(),
            "CONCURRENCY_CONFLICT"
        );
        assert_eq!(
            AppError::Database(sqlx::Error::RowNotFound).error_code(),
            "EVALUATION_FAILURE"
        );
    }

    #[test]
    fn test_user_message_no_sensitive_info() {
        let error = AppError::Database(sqlx::Error::RowNotFound);
        let message = error.user_message();
        assert_eq!(message, "Database error occurred");
        assert!(!message.contains("sqlx"));
    }
}
