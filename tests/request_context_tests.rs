//! 请求追踪上下文集成测试
//!
//! 在 tower 层驱动追踪中间件：trace_id/request_id 写入请求扩展，
//! 错误响应体与响应头报告同一个 request_id

use axum::{
    body::Body,
    http::{Request, StatusCode},
    routing::get,
    Extension, Router,
};
use http_body_util::BodyExt;
use serde_json::Value;
use signflow_service::error::AppError;
use signflow_service::middleware::{request_tracking_middleware, RequestContext};
use tower::ServiceExt;

fn traced_router() -> Router {
    Router::new()
        .route(
            "/denied",
            get(|| async { Err::<(), AppError>(AppError::Forbidden) }),
        )
        .route(
            "/context",
            get(|Extension(ctx): Extension<RequestContext>| async move {
                axum::Json(serde_json::json!({
                    "trace_id": ctx.trace_id,
                    "request_id": ctx.request_id,
                }))
            }),
        )
        .layer(axum::middleware::from_fn(request_tracking_middleware))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("Body should be JSON")
}

#[tokio::test]
async fn test_error_body_reports_response_request_id() {
    let app = traced_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/denied")
                .body(Body::empty())
                .expect("Request should build"),
        )
        .await
        .expect("Request should complete");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let header_request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("Response should carry x-request-id")
        .to_string();

    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "AUTHORIZATION_DENIED");
    assert_eq!(body["error"]["request_id"], header_request_id.as_str());
}

#[tokio::test]
async fn test_context_extension_matches_response_headers() {
    let app = traced_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/context")
                .header("x-trace-id", "trace-from-client-42")
                .body(Body::empty())
                .expect("Request should build"),
        )
        .await
        .expect("Request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let header_trace_id = response
        .headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .expect("Response should carry x-trace-id")
        .to_string();
    let header_request_id = response
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .expect("Response should carry x-request-id")
        .to_string();

    // 客户端提供的 trace_id 原样贯穿
    assert_eq!(header_trace_id, "trace-from-client-42");

    let body = body_json(response).await;
    assert_eq!(body["trace_id"], header_trace_id.as_str());
    assert_eq!(body["request_id"], header_request_id.as_str());
}

#[tokio::test]
async fn test_trace_id_minted_when_client_sends_none() {
    let app = traced_router();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/context")
                .body(Body::empty())
                .expect("Request should build"),
        )
        .await
        .expect("Request should complete");

    assert_eq!(response.status(), StatusCode::OK);
    let header_trace_id = response
        .headers()
        .get("x-trace-id")
        .and_then(|v| v.to_str().ok())
        .expect("Response should carry x-trace-id")
        .to_string();

    let body = body_json(response).await;
    assert!(!header_trace_id.is_empty());
    assert_eq!(body["trace_id"], header_trace_id.as_str());
}
