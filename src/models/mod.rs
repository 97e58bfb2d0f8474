//! Domain models

pub mod audit;
pub mod order;
pub mod role;
