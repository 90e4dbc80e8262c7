//! Embedder trait for text-to-vector conversion.
//!
//! Implementations (OpenAI-compatible embeddings, Qianfan) live in confab-infra.
//! Vectors are returned to the caller and never stored by this service.

use confab_types::llm::LlmError;

/// Trait for converting text into embedding vectors.
pub trait Embedder: Send + Sync {
    /// Embed one or more texts. Returns one vector per input text.
    fn embed(
        &self,
        texts: &[String],
    ) -> impl std::future::Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// The model name used for embeddings (e.g., "text-embedding-3-small").
    fn model_name(&self) -> &str;

    /// Configured dimensionality of the output vectors, if fixed.
    fn dimension(&self) -> Option<u32>;
}
