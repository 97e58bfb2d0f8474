//! Webhook 验真门集成测试
//!
//! 在 tower 层直接驱动验真中间件：签名校验、时间戳窗口、重放去重与不安全模式

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::post,
    Router,
};
use http_body_util::BodyExt;
use secrecy::Secret;
use signflow_service::auth::webhook::{
    webhook_auth_middleware, WebhookGate, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};
use signflow_service::cache::TtlCache;
use signflow_service::config::WebhookConfig;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "test-dropbox-sign-callback-secret";
const ACK: &str = "Hello API Event Received";

fn test_webhook_config(with_secret: bool) -> WebhookConfig {
    WebhookConfig {
        dropbox_sign_secret: with_secret.then(|| Secret::new(SECRET.to_string())),
        timestamp_window_secs: 300,
        dedup_ttl_secs: 3600,
        max_body_bytes: 1048576,
    }
}

/// 构造带计数处理器的测试路由，返回路由与处理器调用计数
fn gate_router(config: WebhookConfig) -> (Router, Arc<AtomicUsize>) {
    let gate = Arc::new(WebhookGate::from_config(&config, Arc::new(TtlCache::new())));
    let counter = Arc::new(AtomicUsize::new(0));
    let handler_counter = counter.clone();

    let router = Router::new()
        .route(
            "/webhooks/dropbox-sign",
            post(move || {
                let handler_counter = handler_counter.clone();
                async move {
                    handler_counter.fetch_add(1, Ordering::SeqCst);
                    ACK
                }
            }),
        )
        .layer(axum::middleware::from_fn_with_state(
            gate,
            webhook_auth_middleware,
        ));

    (router, counter)
}

/// 构造已签名的回调请求
fn signed_request(body: &str, timestamp_offset_secs: i64) -> Request<Body> {
    let signature = WebhookGate::compute_signature(SECRET.as_bytes(), body.as_bytes()).unwrap();
    let timestamp = chrono::Utc::now().timestamp() + timestamp_offset_secs;

    Request::builder()
        .method("POST")
        .uri("/webhooks/dropbox-sign")
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .header(TIMESTAMP_HEADER, timestamp.to_string())
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_valid_signature_reaches_handler() {
    let (router, counter) = gate_router(test_webhook_config(true));

    let body = r#"{"event":{"event_type":"signature_request_signed"}}"#;
    let response = router.oneshot(signed_request(body, 0)).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, ACK);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_duplicate_delivery_acknowledged_without_handler() {
    let (router, counter) = gate_router(test_webhook_config(true));

    let body = r#"{"event":{"event_type":"signature_request_signed","event_hash":"abc"}}"#;

    let first = router
        .clone()
        .oneshot(signed_request(body, 0))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // 完全相同的载荷重复投递：仍回 200，但处理器不再执行
    let second = router.oneshot(signed_request(body, 0)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert!(body_string(second).await.contains("duplicate"));

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_distinct_payloads_are_not_deduplicated() {
    let (router, counter) = gate_router(test_webhook_config(true));

    let first = router
        .clone()
        .oneshot(signed_request(r#"{"event":{"event_type":"a"}}"#, 0))
        .await
        .unwrap();
    let second = router
        .oneshot(signed_request(r#"{"event":{"event_type":"b"}}"#, 0))
        .await
        .unwrap();

    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_missing_signature_header_rejected() {
    let (router, counter) = gate_router(test_webhook_config(true));

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/dropbox-sign")
        .header(TIMESTAMP_HEADER, chrono::Utc::now().timestamp().to_string())
        .body(Body::from(r#"{"event":{"event_type":"x"}}"#))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_invalid_signature_rejected() {
    let (router, counter) = gate_router(test_webhook_config(true));

    let request = Request::builder()
        .method("POST")
        .uri("/webhooks/dropbox-sign")
        .header(SIGNATURE_HEADER, "deadbeef".repeat(8))
        .header(TIMESTAMP_HEADER, chrono::Utc::now().timestamp().to_string())
        .body(Body::from(r#"{"event":{"event_type":"x"}}"#))
        .unwrap();

    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_timestamp_window_enforced() {
    // 4 分 59 秒前的时间戳：接受
    let (router, _) = gate_router(test_webhook_config(true));
    let response = router
        .oneshot(signed_request(r#"{"event":{"event_type":"x"}}"#, -299))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // 5 分 1 秒前的时间戳：拒绝
    let (router, counter) = gate_router(test_webhook_config(true));
    let response = router
        .oneshot(signed_request(r#"{"event":{"event_type":"x"}}"#, -301))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_insecure_mode_skips_verification_but_still_deduplicates() {
    let (router, counter) = gate_router(test_webhook_config(false));

    // 未配置密钥：无任何签名头也放行
    let request = || {
        Request::builder()
            .method("POST")
            .uri("/webhooks/dropbox-sign")
            .body(Body::from(r#"{"event":{"event_type":"x"}}"#))
            .unwrap()
    };

    let first = router.clone().oneshot(request()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    // 去重仍然生效
    let second = router.oneshot(request()).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}
