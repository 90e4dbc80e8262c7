//! [`ClientBuilder`] backed by the real provider clients.

use std::time::Duration;

use confab_core::llm::box_embedder::BoxEmbedder;
use confab_core::llm::box_provider::BoxLlmProvider;
use confab_core::provider::factory::ClientBuilder;
use confab_types::config::ProviderSettings;
use confab_types::llm::LlmError;
use confab_types::provider::{ModelConfig, ProviderKind};

use super::openai_compat::OpenAiCompatibleProvider;
use super::openai_compat::config as compat;
use super::openai_compat::embedding::OpenAiCompatibleEmbedder;
use super::qianfan::{self, QianfanEmbedder, QianfanProvider};

/// Builds provider clients with a shared HTTP request timeout.
#[derive(Debug, Clone)]
pub struct ProviderClientBuilder {
    timeout: Duration,
}

impl ProviderClientBuilder {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::new(Duration::from_secs(settings.request_timeout_secs))
    }
}

impl ClientBuilder for ProviderClientBuilder {
    fn build_chat(
        &self,
        kind: ProviderKind,
        config: &ModelConfig,
    ) -> Result<BoxLlmProvider, LlmError> {
        match kind {
            ProviderKind::QFan => {
                let resolved = qianfan::from_model_config(config, false, self.timeout)?;
                Ok(BoxLlmProvider::new(QianfanProvider::new(resolved)?))
            }
            ProviderKind::AzureOpenAi => {
                let resolved = compat::from_model_config(kind, config, self.timeout)?;
                Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::azure(resolved)?))
            }
            ProviderKind::OpenAi
            | ProviderKind::Gemini
            | ProviderKind::Ollama
            | ProviderKind::Claude
            | ProviderKind::QWen
            | ProviderKind::Zhipu
            | ProviderKind::Yi
            | ProviderKind::Douyin
            | ProviderKind::Deepseek
            | ProviderKind::Silicon
            | ProviderKind::Spark => {
                let resolved = compat::from_model_config(kind, config, self.timeout)?;
                Ok(BoxLlmProvider::new(OpenAiCompatibleProvider::new(resolved)?))
            }
        }
    }

    fn build_embedding(
        &self,
        kind: ProviderKind,
        config: &ModelConfig,
    ) -> Result<BoxEmbedder, LlmError> {
        match kind {
            ProviderKind::QFan => {
                let resolved = qianfan::from_model_config(config, true, self.timeout)?;
                Ok(BoxEmbedder::new(QianfanEmbedder::new(resolved)?))
            }
            ProviderKind::AzureOpenAi => {
                let resolved = compat::from_model_config(kind, config, self.timeout)?;
                Ok(BoxEmbedder::new(OpenAiCompatibleEmbedder::azure(resolved)?))
            }
            ProviderKind::OpenAi
            | ProviderKind::Gemini
            | ProviderKind::Ollama
            | ProviderKind::QWen
            | ProviderKind::Zhipu
            | ProviderKind::Silicon => {
                let resolved = compat::from_model_config(kind, config, self.timeout)?;
                Ok(BoxEmbedder::new(OpenAiCompatibleEmbedder::new(resolved)?))
            }
            ProviderKind::Claude
            | ProviderKind::Yi
            | ProviderKind::Douyin
            | ProviderKind::Deepseek
            | ProviderKind::Spark => Err(LlmError::InvalidRequest(format!(
                "{} has no embedding endpoint",
                kind.tag()
            ))),
        }
    }
}
