//! HTTP 处理器模块

pub mod audit;
pub mod health;
pub mod order;
pub mod role;
pub mod sign_webhook;
