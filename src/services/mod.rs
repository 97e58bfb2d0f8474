//! Business logic services layer

pub mod audit_service;
pub mod freshness_service;
pub mod permission_service;

pub use audit_service::{AuditDrain, AuditService};
pub use freshness_service::FreshnessService;
pub use permission_service::PermissionService;
