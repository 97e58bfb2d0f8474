//! Authentication and authorization module

pub mod jwt;
pub mod middleware;
pub mod webhook;

pub use jwt::{Claims, JwtService};
pub use middleware::{
    authorization_middleware, extract_token, jwt_auth_middleware, token_freshness_middleware,
    AuthContext,
};
pub use webhook::{webhook_auth_middleware, WebhookGate};
