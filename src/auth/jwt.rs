//! JWT token validation
//! Credential issuance lives outside this service; we only consume the
//! principal id, the credential version claim and the expiry.

use crate::{config::AppConfig, error::AppError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (principal ID)
    pub sub: String,

    /// Credential version at issuance time; compared against the
    /// freshness cache on every request. Absent in tokens minted before
    /// versioning was introduced — the freshness gate then skips.
    pub ver: Option<i64>,

    /// Issued at
    pub iat: i64,

    /// Expiration
    pub exp: i64,

    /// JWT ID (unique token identifier)
    pub jti: String,
}

/// JWT service
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_exp_secs: u64,
}

impl JwtService {
    /// Create JWT service from config
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let secret = config.security.jwt_secret.expose_secret();

        // Ensure secret is at least 32 bytes for HS256
        if secret.len() < 32 {
            return Err(AppError::Config("JWT secret too short (min 32 chars)".to_string()));
        }

        let encoding_key = EncodingKey::from_secret(secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(secret.as_bytes());

        Ok(Self {
            encoding_key,
            decoding_key,
            access_token_exp_secs: config.security.access_token_exp_secs,
        })
    }

    /// Generate access token (used by provisioning tooling and tests;
    /// the production issuer is an external collaborator)
    pub fn generate_access_token(
        &self,
        principal_id: &Uuid,
        version: i64,
    ) -> Result<String, AppError> {
        let now = Utc::now();
        let expiration = now + Duration::seconds(self.access_token_exp_secs as i64);

        let claims = Claims {
            sub: principal_id.to_string(),
            ver: Some(version),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode access token: {:?}", e);
            AppError::Internal(format!("Failed to encode access token: {}", e))
        })
    }

    /// Validate and decode token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AppError> {
        Ok(decode::<Claims>(token, &self.decoding_key, &Validation::new(Algorithm::HS256))
            .map_err(|e| {
                tracing::debug!("Token validation failed: {:?}", e);
                AppError::Unauthorized
            })?
            .claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::*;
    use secrecy::Secret;

    // Mock config for testing
    fn test_config() -> AppConfig {
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
    fn test_generate_and_validate_token() {
        let service = JwtService::from_config(&test_config()).unwrap();
        let principal_id = Uuid::new_v4();

        let token = service.generate_access_token(&principal_id, 7).unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, principal_id.to_string());
        assert_eq!(claims.ver, Some(7));
    }

    #[test]
    fn test_invalid_token_fails() {
        let service = JwtService::from_config(&test_config()).unwrap();
        assert!(service.validate_token("invalid_token").is_err());
    }

    #[test]
    fn test_token_from_other_secret_fails() {
        let service = JwtService::from_config(&test_config()).unwrap();

        let mut other_config = test_config();
        other_config.security.jwt_secret =
            Secret::new("another_secret_key_32_characters!!".to_string());
        let other_service = JwtService::from_config(&other_config).unwrap();

        let token = other_service
            .generate_access_token(&Uuid::new_v4(), 1)
            .unwrap();
        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn test_version_claim_optional() {
        // ver 缺失的旧令牌仍可解析，由新鲜度门决定跳过
        let json = serde_json::json!({
            "sub": Uuid::new_v4().to_string(),
            "iat": 0,
            "exp": i64::MAX,
            "jti": "x",
        });
        let claims: Claims = serde_json::from_value(json).unwrap();
        assert!(claims.ver.is_none());
    }
}
