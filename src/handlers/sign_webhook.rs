//! Dropbox Sign 回调处理器
//! 签名、时间戳与重放校验都在验真门里完成，进入此处的请求已可信。
//! 响应体必须是 "Hello API Event Received"，发送方以此确认投递成功。

use axum::{body::Bytes, http::StatusCode, response::IntoResponse};
use serde::Deserialize;

/// 回调确认文本（发送方要求的固定应答）
pub const WEBHOOK_ACK: &str = "Hello API Event Received";

/// 回调事件载荷（只取需要记录的字段）
#[derive(Debug, Deserialize)]
pub struct SignEventEnvelope {
    pub event: SignEvent,
}

#[derive(Debug, Deserialize)]
pub struct SignEvent {
    pub event_type: String,
    #[serde(default)]
    pub event_time: Option<String>,
    #[serde(default)]
    pub event_hash: Option<String>,
}

/// 接收签署事件
/// 载荷格式不符时仍回 200：验真已通过，拒收只会触发发送方无意义的重试
pub async fn receive_sign_event(body: Bytes) -> impl IntoResponse {
    match serde_json::from_slice::<SignEventEnvelope>(&body) {
        Ok(envelope) => {
            metrics::counter!(
                "sign_events_received_total",
                "event_type" => envelope.event.event_type.clone()
            )
            .increment(1);
            tracing::info!(
                event_type = %envelope.event.event_type,
                event_time = ?envelope.event.event_time,
                "Sign event received"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, "Sign event payload not in expected shape");
        }
    }

    (StatusCode::OK, WEBHOOK_ACK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_parses_minimal_payload() {
        let body = br#"{"event":{"event_type":"signature_request_signed"}}"#;
        let envelope: SignEventEnvelope = serde_json::from_slice(body).unwrap();
        assert_eq!(envelope.event.event_type, "signature_request_signed");
        assert!(envelope.event.event_time.is_none());
    }
}
