//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (confab-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod app;
pub mod conversation;
pub mod model_config;
