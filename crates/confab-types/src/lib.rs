//! Shared domain types for Confab.
//!
//! This crate contains the domain types used across the chat service:
//! model configurations and provider families, conversations and stream
//! fragments, application profiles, configuration, and error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod app;
pub mod chat;
pub mod config;
pub mod error;
pub mod llm;
pub mod provider;
