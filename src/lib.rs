//! 业务操作前置的授权与数据一致性层
//! 提供权限评估、凭证新鲜度校验、Webhook 验真与乐观并发控制

pub mod auth;
pub mod cache;
pub mod concurrency;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod telemetry;
