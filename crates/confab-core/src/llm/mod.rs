//! Client abstractions for model backends.
//!
//! - `LlmProvider`: RPITIT trait for chat completion backends
//! - `BoxLlmProvider`: object-safe wrapper for dynamic dispatch
//! - `Embedder` / `BoxEmbedder`: the same pair for embedding backends

pub mod box_embedder;
pub mod box_provider;
pub mod embedder;
pub mod provider;
