//! LLM provider implementations.
//!
//! Concrete [`LlmProvider`](confab_core::llm::provider::LlmProvider) and
//! [`Embedder`](confab_core::llm::embedder::Embedder) clients, plus the
//! [`ProviderClientBuilder`] the model client factory uses to construct
//! them from stored model configs.

pub mod builder;
pub mod openai_compat;
pub mod qianfan;

pub use builder::ProviderClientBuilder;
