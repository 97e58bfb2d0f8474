//! Webhook 验真门（Dropbox Sign 回调专用管线）
//! 先完整缓冲原始请求体，再做签名校验、时间戳新鲜度校验与重放去重；
//! 校验后请求体对下游处理器保持可重读

use crate::{
    cache::{webhook_dedup_key, TtlCache},
    config::WebhookConfig,
    error::AppError,
};
use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, Secret};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// 签名头：原始请求体的 HMAC-SHA256，十六进制编码
pub const SIGNATURE_HEADER: &str = "x-dropbox-signature";
/// 时间戳头：Unix 秒
pub const TIMESTAMP_HEADER: &str = "x-dropbox-request-timestamp";

/// Webhook 验真门
/// 独立于 JWT/权限管线，仅挂载在回调路径上
pub struct WebhookGate {
    secret: Option<Secret<String>>,
    dedup: Arc<TtlCache>,
    timestamp_window_secs: i64,
    dedup_ttl: Duration,
    max_body_bytes: usize,
}

impl WebhookGate {
    pub fn from_config(config: &WebhookConfig, dedup: Arc<TtlCache>) -> Self {
        if config.dropbox_sign_secret.is_none() {
            tracing::warn!(
                "Webhook shared secret not configured: running in INSECURE mode. \
                 Signatures will not be verified. Do not use in production."
            );
        }

        Self {
            secret: config.dropbox_sign_secret.clone(),
            dedup,
            timestamp_window_secs: config.timestamp_window_secs,
            dedup_ttl: Duration::from_secs(config.dedup_ttl_secs),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// 计算期望签名：HMAC-SHA256(secret, body)，十六进制
    pub fn compute_signature(secret: &[u8], body: &[u8]) -> Result<String, AppError> {
        let mut mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| AppError::Internal(format!("Invalid HMAC key: {e}")))?;
        mac.update(body);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// 常数时间比较，避免签名校验的时间侧信道
    pub fn signatures_match(expected_hex: &str, provided_hex: &str) -> bool {
        let provided = provided_hex.trim().to_ascii_lowercase();
        expected_hex.as_bytes().ct_eq(provided.as_bytes()).into()
    }

    /// 时间戳新鲜度：|now - ts| 超窗口即拒绝，防御旧报文重放
    pub fn timestamp_within_window(timestamp_secs: i64, now_secs: i64, window_secs: i64) -> bool {
        (now_secs - timestamp_secs).abs() <= window_secs
    }

    /// 请求体指纹：SHA-256 十六进制，用于重放去重
    pub fn fingerprint(body: &[u8]) -> String {
        hex::encode(Sha256::digest(body))
    }

    fn verify(&self, body: &[u8], headers: &axum::http::HeaderMap) -> Result<(), AppError> {
        let Some(secret) = &self.secret else {
            // 不安全模式：放行但显式标记，便于观测
            metrics::counter!("webhook_insecure_accept_total").increment(1);
            tracing::warn!("Webhook accepted WITHOUT signature verification (insecure mode)");
            return Ok(());
        };

        // 任何密码学计算之前先要求两个头都在
        let provided_signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                metrics::counter!("webhook_rejected_total", "reason" => "missing_signature")
                    .increment(1);
                AppError::webhook_unauthenticated("Missing signature header")
            })?;

        let timestamp: i64 = headers
            .get(TIMESTAMP_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| {
                metrics::counter!("webhook_rejected_total", "reason" => "missing_timestamp")
                    .increment(1);
                AppError::webhook_unauthenticated("Missing or malformed timestamp header")
            })?;

        let now = chrono::Utc::now().timestamp();
        if !Self::timestamp_within_window(timestamp, now, self.timestamp_window_secs) {
            metrics::counter!("webhook_rejected_total", "reason" => "stale_timestamp").increment(1);
            tracing::warn!(
                timestamp = timestamp,
                now = now,
                window_secs = self.timestamp_window_secs,
                "Webhook timestamp outside freshness window"
            );
            return Err(AppError::webhook_unauthenticated(
                "Request timestamp outside acceptance window",
            ));
        }

        let expected = Self::compute_signature(secret.expose_secret().as_bytes(), body)?;
        if !Self::signatures_match(&expected, provided_signature) {
            metrics::counter!("webhook_rejected_total", "reason" => "bad_signature").increment(1);
            tracing::warn!("Webhook signature mismatch");
            return Err(AppError::webhook_unauthenticated("Invalid signature"));
        }

        Ok(())
    }

    /// 重放去重：首次出现则登记指纹，重复出现返回 false
    fn register_first_delivery(&self, fingerprint: &str) -> bool {
        let key = webhook_dedup_key(fingerprint);
        self.dedup.insert_if_absent(&key, "1", self.dedup_ttl)
    }
}

/// Webhook 验真中间件
/// 重复投递回应 200 而不调用处理器：对发送方而言"已处理"不能看起来像错误，
/// 否则会触发无意义的重试
pub async fn webhook_auth_middleware(
    State(gate): State<Arc<WebhookGate>>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();

    // 完整缓冲请求体：签名必须覆盖原始字节
    let body_bytes = axum::body::to_bytes(body, gate.max_body_bytes)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Failed to buffer webhook body");
            AppError::BadRequest("Unable to read request body".to_string())
        })?;

    gate.verify(&body_bytes, &parts.headers)?;

    let fingerprint = WebhookGate::fingerprint(&body_bytes);
    if !gate.register_first_delivery(&fingerprint) {
        metrics::counter!("webhook_duplicate_total").increment(1);
        tracing::info!(
            fingerprint = %fingerprint,
            "Duplicate webhook delivery, responding success without handler invocation"
        );
        return Ok((
            StatusCode::OK,
            Json(json!({
                "status": "duplicate",
                "message": "Event already processed"
            })),
        )
            .into_response());
    }

    metrics::counter!("webhook_accepted_total").increment(1);

    // 重建请求，请求体对下游保持可读
    let req = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-webhook-secret";

    #[test]
    fn test_signature_roundtrip() {
        let body = br#"{"event":{"event_type":"signature_request_signed"}}"#;
        let expected = WebhookGate::compute_signature(SECRET, body).unwrap();

        assert!(WebhookGate::signatures_match(&expected, &expected));
        // 大小写不敏感（十六进制编码）
        assert!(WebhookGate::signatures_match(&expected, &expected.to_uppercase()));
    }

    #[test]
    fn test_signature_mismatch() {
        let expected = WebhookGate::compute_signature(SECRET, b"payload-a").unwrap();
        let other = WebhookGate::compute_signature(SECRET, b"payload-b").unwrap();

        assert!(!WebhookGate::signatures_match(&expected, &other));
        assert!(!WebhookGate::signatures_match(&expected, "deadbeef"));
        assert!(!WebhookGate::signatures_match(&expected, ""));
    }

    #[test]
    fn test_signature_differs_by_secret() {
        let a = WebhookGate::compute_signature(b"secret-a", b"payload").unwrap();
        let b = WebhookGate::compute_signature(b"secret-b", b"payload").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_timestamp_window_boundaries() {
        let now = 1_700_000_000;
        let window = 300;

        // 4 分 59 秒前：接受
        assert!(WebhookGate::timestamp_within_window(now - 299, now, window));
        // 恰好 5 分钟：接受（窗口为闭区间）
        assert!(WebhookGate::timestamp_within_window(now - 300, now, window));
        // 5 分 1 秒前：拒绝
        assert!(!WebhookGate::timestamp_within_window(now - 301, now, window));
        // 未来的时间戳同样受窗口约束
        assert!(!WebhookGate::timestamp_within_window(now + 301, now, window));
    }

    #[test]
    fn test_fingerprint_is_stable_sha256_hex() {
        let fp = WebhookGate::fingerprint(b"hello");
        assert_eq!(fp.len(), 64);
        assert_eq!(fp, WebhookGate::fingerprint(b"hello"));
        assert_ne!(fp, WebhookGate::fingerprint(b"hello!"));
    }
}
