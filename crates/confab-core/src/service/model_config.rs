//! Model configuration management.
//!
//! Writes go to the repository first and are then applied to the
//! [`ModelClientFactory`] before the call returns, so cached clients built
//! from old credentials are gone by the time the next chat request looks
//! them up.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use confab_types::error::{ManagementError, RepositoryError};
use confab_types::llm::{CompletionRequest, Message, MessageRole};
use confab_types::provider::{Capability, ModelConfig, ModelType, is_masked};

use crate::provider::catalog;
use crate::provider::factory::{ClientBuilder, ConfigChange, ModelClientFactory};
use crate::repository::model_config::ModelConfigRepository;
use crate::service::WriteLocks;

/// What a config can do, and whether it is complete enough to try.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityReport {
    pub model_id: String,
    pub provider: String,
    /// Validation failure, if any.
    pub problem: Option<String>,
    pub capabilities: Vec<Capability>,
}

/// Outcome of a live round trip against a provider.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub model_id: String,
    pub ok: bool,
    pub latency_ms: u64,
    pub detail: String,
}

pub struct ModelConfigService<M: ModelConfigRepository, B: ClientBuilder> {
    repo: M,
    factory: Arc<ModelClientFactory<B>>,
    writes: WriteLocks,
}

impl<M: ModelConfigRepository, B: ClientBuilder> ModelConfigService<M, B> {
    pub fn new(repo: M, factory: Arc<ModelClientFactory<B>>) -> Self {
        Self {
            repo,
            factory,
            writes: WriteLocks::default(),
        }
    }

    pub fn factory(&self) -> &Arc<ModelClientFactory<B>> {
        &self.factory
    }

    /// Populate the factory from storage. Called once at startup.
    pub async fn load_all(&self) -> Result<usize, RepositoryError> {
        let configs = self.repo.list(None).await?;
        Ok(self.factory.load(configs))
    }

    /// Configs with their secrets masked.
    pub async fn list(&self, model_type: Option<ModelType>) -> Result<Vec<ModelConfig>, RepositoryError> {
        let configs = self.repo.list(model_type).await?;
        Ok(configs.iter().map(ModelConfig::redacted).collect())
    }

    pub async fn get(&self, id: &str) -> Result<ModelConfig, ManagementError> {
        let config = self.repo.get(id).await?.ok_or(RepositoryError::NotFound)?;
        Ok(config.redacted())
    }

    /// Store a new config.
    ///
    /// Masked secrets carry no value on create and are dropped. A blank id
    /// is replaced with a generated one.
    pub async fn create(&self, mut config: ModelConfig) -> Result<ModelConfig, ManagementError> {
        if config.id.trim().is_empty() {
            config.id = Uuid::now_v7().simple().to_string();
        }
        Self::check_shape(&config)?;
        config.api_key = config.api_key.filter(|v| !is_masked(v));
        config.secret_key = config.secret_key.filter(|v| !is_masked(v));

        let _write = self.writes.lock(&config.id).await;
        self.repo.create(&config).await?;
        self.factory.apply(ConfigChange::Upserted(config.clone()));
        info!(model_id = %config.id, provider = %config.provider, "created model config");
        Ok(config.redacted())
    }

    /// Replace a stored config.
    ///
    /// A secret that is absent or masked keeps the stored value; an empty
    /// string clears it.
    pub async fn update(&self, mut config: ModelConfig) -> Result<ModelConfig, ManagementError> {
        Self::check_shape(&config)?;
        let _write = self.writes.lock(&config.id).await;
        let existing = self
            .repo
            .get(&config.id)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        config.api_key = merge_secret(config.api_key, existing.api_key);
        config.secret_key = merge_secret(config.secret_key, existing.secret_key);

        self.repo.update(&config).await?;
        self.factory.apply(ConfigChange::Upserted(config.clone()));
        info!(model_id = %config.id, "updated model config");
        Ok(config.redacted())
    }

    pub async fn delete(&self, id: &str) -> Result<(), ManagementError> {
        let _write = self.writes.lock(id).await;
        self.repo.delete(id).await?;
        self.factory.apply(ConfigChange::Deleted(id.to_string()));
        info!(model_id = %id, "deleted model config");
        Ok(())
    }

    /// Report capabilities and validation state without building a client.
    pub fn capabilities(&self, id: &str) -> Result<CapabilityReport, ManagementError> {
        let config = self
            .factory
            .config(id)
            .ok_or_else(|| confab_types::error::ConfigError::ModelNotFound(id.to_string()))?;
        let kind = catalog::identify(&config)?;
        let problem = catalog::validate(&config).err().map(|e| e.to_string());
        let capabilities = Capability::ALL
            .into_iter()
            .filter(|c| catalog::supports(kind, *c))
            .collect();
        Ok(CapabilityReport {
            model_id: config.id,
            provider: kind.tag().to_string(),
            problem,
            capabilities,
        })
    }

    /// Send a minimal request through the cached client for this config.
    ///
    /// Chat configs get a tiny completion, embedding configs embed one
    /// word. Provider failures are reported, not returned as errors.
    pub async fn probe(&self, id: &str) -> Result<ProbeReport, ManagementError> {
        let config = self
            .factory
            .config(id)
            .ok_or_else(|| confab_types::error::ConfigError::ModelNotFound(id.to_string()))?;
        let started = Instant::now();

        let result = match config.model_type {
            ModelType::Embedding => match self.factory.embedding_client(id)? {
                Some(embedder) => embedder
                    .embed(&["ping".to_string()])
                    .await
                    .map(|vectors| {
                        let dims = vectors.first().map(Vec::len).unwrap_or(0);
                        format!("embedding with {dims} dimensions")
                    }),
                None => return Err(unsupported(&config, Capability::Embedding)),
            },
            _ => match self.factory.chat_client(id)? {
                Some(client) => {
                    let request = CompletionRequest {
                        model: config.model.clone(),
                        messages: vec![Message::new(MessageRole::User, "Hello")],
                        system: None,
                        max_tokens: Some(10),
                        temperature: Some(0.0),
                        top_p: None,
                        stream: false,
                    };
                    client
                        .complete(&request)
                        .await
                        .map(|r| format!("{} replied ({} tokens)", r.model, r.usage.total()))
                }
                None => return Err(unsupported(&config, Capability::Chat)),
            },
        };

        let latency_ms = started.elapsed().as_millis() as u64;
        Ok(match result {
            Ok(detail) => ProbeReport {
                model_id: config.id,
                ok: true,
                latency_ms,
                detail,
            },
            Err(e) => ProbeReport {
                model_id: config.id,
                ok: false,
                latency_ms,
                detail: e.to_string(),
            },
        })
    }

    fn check_shape(config: &ModelConfig) -> Result<(), ManagementError> {
        if config.model.trim().is_empty() {
            return Err(ManagementError::InvalidInput("model must not be empty".to_string()));
        }
        catalog::identify(config)?;
        Ok(())
    }
}

fn unsupported(config: &ModelConfig, capability: Capability) -> ManagementError {
    confab_types::error::ConfigError::UnsupportedCapability {
        provider: config.provider.clone(),
        capability,
    }
    .into()
}

/// Resolve a submitted secret against the stored one.
fn merge_secret(submitted: Option<String>, stored: Option<String>) -> Option<String> {
    match submitted {
        None => stored,
        Some(value) if is_masked(&value) => stored,
        Some(value) if value.is_empty() => None,
        Some(value) => Some(value),
    }
}
