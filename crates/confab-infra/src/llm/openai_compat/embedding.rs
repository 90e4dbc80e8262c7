//! Embeddings over the OpenAI `/embeddings` endpoint.

use async_openai::Client;
use async_openai::config::{AzureConfig, Config, OpenAIConfig};
use async_openai::types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput};

use confab_core::llm::embedder::Embedder;
use confab_types::llm::LlmError;

use super::config::OpenAiCompatConfig;
use super::{azure_client, map_openai_error, openai_client};

/// Does NOT derive Debug: the client holds the API key.
pub struct OpenAiCompatibleEmbedder<C: Config = OpenAIConfig> {
    client: Client<C>,
    model: String,
    dimension: Option<u32>,
}

impl OpenAiCompatibleEmbedder<OpenAIConfig> {
    pub fn new(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: openai_client(&config)?,
            model: config.model,
            dimension: config.dimension,
        })
    }
}

impl OpenAiCompatibleEmbedder<AzureConfig> {
    pub fn azure(config: OpenAiCompatConfig) -> Result<Self, LlmError> {
        Ok(Self {
            client: azure_client(&config)?,
            model: config.model,
            dimension: config.dimension,
        })
    }
}

impl<C> Embedder for OpenAiCompatibleEmbedder<C>
where
    C: Config + Send + Sync + 'static,
{
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut args = CreateEmbeddingRequestArgs::default();
        args.model(&self.model)
            .input(EmbeddingInput::StringArray(texts.to_vec()));
        if let Some(dimension) = self.dimension {
            args.dimensions(dimension);
        }
        let request = args.build().map_err(map_openai_error)?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        let mut data = response.data;
        data.sort_by_key(|e| e.index);
        if data.len() != texts.len() {
            return Err(LlmError::Deserialization(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                data.len()
            )));
        }
        Ok(data.into_iter().map(|e| e.embedding).collect())
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> Option<u32> {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use confab_types::provider::{ModelConfig, ModelType, ProviderKind};

    use crate::llm::openai_compat::config::from_model_config;

    #[tokio::test]
    async fn test_empty_input_makes_no_request() {
        let mut cfg = ModelConfig::new("e1", "OLLAMA", "nomic-embed-text");
        cfg.model_type = ModelType::Embedding;
        // Unroutable port: any request would fail.
        cfg.base_url = Some("http://127.0.0.1:9".to_string());
        cfg.dimension = Some(768);
        let resolved =
            from_model_config(ProviderKind::Ollama, &cfg, Duration::from_secs(1)).unwrap();
        let embedder = OpenAiCompatibleEmbedder::new(resolved).unwrap();

        assert!(embedder.embed(&[]).await.unwrap().is_empty());
        assert_eq!(embedder.model_name(), "nomic-embed-text");
        assert_eq!(embedder.dimension(), Some(768));
    }
}
