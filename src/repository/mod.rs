//! Database repository layer

pub mod audit_repo;
pub mod order_repo;
pub mod role_repo;
pub mod version_repo;

pub use audit_repo::AuditRepository;
pub use order_repo::OrderRepository;
pub use role_repo::RoleRepository;
pub use version_repo::VersionStore;
