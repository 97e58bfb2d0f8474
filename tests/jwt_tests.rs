//! JWT 服务单元测试
//!
//! 测试令牌生成、验证与版本号声明

use secrecy::Secret;
use signflow_service::auth::jwt::JwtService;
use signflow_service::config::{
    AppConfig, CacheConfig, DatabaseConfig, LoggingConfig, SecurityConfig, ServerConfig,
    WebhookConfig,
};
use uuid::Uuid;

/// 创建测试配置
fn create_test_config() -> AppConfig {
    AppConfig {
        server: ServerConfig {
            addr: "127.0.0.1:3000".to_string(),
            graceful_shutdown_timeout_secs: 30,
        },
        database: DatabaseConfig {
            url: Secret::new("postgresql://localhost/test".to_string()),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 30,
            idle_timeout_secs: 600,
            max_lifetime_secs: 1800,
        },
        logging: LoggingConfig {
            level: "info".to_string(),
            format: "json".to_string(),
        },
        security: SecurityConfig {
            jwt_secret: Secret::new("test_secret_key_32_characters_long!".to_string()),
            access_token_exp_secs: 900,
            trust_proxy: true,
        },
        webhook: WebhookConfig {
            dropbox_sign_secret: None,
            timestamp_window_secs: 300,
            dedup_ttl_secs: 3600,
            max_body_bytes: 1048576,
        },
        cache: CacheConfig {
            user_version_ttl_secs: 300,
            sweep_interval_secs: 60,
        },
        audit_queue_capacity: 64,
    }
}

#[test]
fn test_jwt_service_creation() {
    let config = create_test_config();
    let service = JwtService::from_config(&config);

    assert!(service.is_ok(), "JWT service should be created successfully");

    // 通过生成 token 验证配置被正确应用
    let service = service.unwrap();
    let principal_id = Uuid::new_v4();
    let token = service
        .generate_access_token(&principal_id, 1)
        .expect("Token generation should succeed");
    let claims = service.validate_token(&token).unwrap();
    let exp_duration = claims.exp - claims.iat;
    assert_eq!(exp_duration, 900);
}

#[test]
fn test_jwt_service_secret_too_short() {
    let mut config = create_test_config();
    config.security.jwt_secret = Secret::new("short".to_string());

    let service = JwtService::from_config(&config);
    assert!(service.is_err(), "Short secret should be rejected");
}

#[test]
fn test_token_roundtrip_carries_version_claim() {
    let config = create_test_config();
    let service = JwtService::from_config(&config).unwrap();

    let principal_id = Uuid::new_v4();
    let token = service.generate_access_token(&principal_id, 7).unwrap();

    let claims = service.validate_token(&token).unwrap();
    assert_eq!(claims.sub, principal_id.to_string());
    assert_eq!(claims.ver, Some(7));
    assert!(!claims.jti.is_empty());
}

#[test]
fn test_tampered_token_rejected() {
    let config = create_test_config();
    let service = JwtService::from_config(&config).unwrap();

    let token = service
        .generate_access_token(&Uuid::new_v4(), 1)
        .unwrap();

    // 篡改签名段
    let mut tampered = token.clone();
    tampered.pop();
    tampered.push(if token.ends_with('A') { 'B' } else { 'A' });

    assert!(service.validate_token(&tampered).is_err());
}

#[test]
fn test_token_from_other_secret_rejected() {
    let config = create_test_config();
    let service = JwtService::from_config(&config).unwrap();

    let mut other_config = create_test_config();
    other_config.security.jwt_secret =
        Secret::new("another_secret_key_32_chars_long!!!".to_string());
    let other_service = JwtService::from_config(&other_config).unwrap();

    let token = other_service
        .generate_access_token(&Uuid::new_v4(), 1)
        .unwrap();

    assert!(service.validate_token(&token).is_err());
}
