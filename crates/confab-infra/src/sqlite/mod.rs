//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod app;
pub mod conversation;
pub mod model_config;
pub mod pool;
