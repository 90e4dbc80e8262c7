//! Infrastructure layer for Confab.
//!
//! Implements the ports defined in `confab-core`: SQLite repositories for
//! model configs, app profiles and conversations, the provider clients
//! behind the model client factory, and the config file loader.

pub mod config;
pub mod llm;
pub mod sqlite;
