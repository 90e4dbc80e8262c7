//! ModelClientFactory: turns model configs into cached, ready-to-use clients.
//!
//! The factory holds every known [`ModelConfig`] in a process-wide
//! `DashMap`, loaded at startup and kept in step with the config store via
//! [`ModelClientFactory::apply`]. Clients are built lazily on first use and
//! cached per config id. Replacing or removing an entry is synchronous, so
//! the next lookup after an edit never sees the old credentials.

use std::sync::{Arc, Mutex, PoisonError};

use dashmap::DashMap;
use tracing::{debug, error, info};

use confab_types::error::ConfigError;
use confab_types::llm::LlmError;
use confab_types::provider::{Capability, ModelConfig, ModelType, ProviderKind};

use super::catalog;
use crate::llm::box_embedder::BoxEmbedder;
use crate::llm::box_provider::BoxLlmProvider;

/// Constructs concrete clients for a validated config.
///
/// Implementations live in confab-infra and match exhaustively over
/// [`ProviderKind`]. Construction is synchronous and performs no network I/O.
pub trait ClientBuilder: Send + Sync + 'static {
    fn build_chat(&self, kind: ProviderKind, config: &ModelConfig)
    -> Result<BoxLlmProvider, LlmError>;

    fn build_embedding(
        &self,
        kind: ProviderKind,
        config: &ModelConfig,
    ) -> Result<BoxEmbedder, LlmError>;
}

/// A write to the model config store that the cache must reflect.
#[derive(Debug, Clone)]
pub enum ConfigChange {
    Upserted(ModelConfig),
    Deleted(String),
}

/// Cached state for one config id.
///
/// A fresh entry replaces the old one on every update, so the lazily built
/// clients can never outlive the config they were built from. Only
/// successful builds are stored.
struct ModelEntry {
    config: ModelConfig,
    chat: Mutex<Option<Arc<BoxLlmProvider>>>,
    embedding: Mutex<Option<Arc<BoxEmbedder>>>,
}

impl ModelEntry {
    fn new(config: ModelConfig) -> Self {
        Self {
            config,
            chat: Mutex::new(None),
            embedding: Mutex::new(None),
        }
    }
}

/// The client in `slot`, building it first if the slot is empty. A failed
/// build leaves the slot empty so the next lookup tries again.
fn cached<T>(slot: &Mutex<Option<Arc<T>>>, build: impl FnOnce() -> Option<Arc<T>>) -> Option<Arc<T>> {
    let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
    if slot.is_none() {
        *slot = build();
    }
    slot.clone()
}

pub struct ModelClientFactory<B: ClientBuilder> {
    builder: B,
    entries: DashMap<String, Arc<ModelEntry>>,
}

impl<B: ClientBuilder> ModelClientFactory<B> {
    pub fn new(builder: B) -> Self {
        Self {
            builder,
            entries: DashMap::new(),
        }
    }

    pub fn builder(&self) -> &B {
        &self.builder
    }

    /// Replace the whole cache with the given configs.
    pub fn load(&self, configs: impl IntoIterator<Item = ModelConfig>) -> usize {
        self.entries.clear();
        for config in configs {
            self.entries
                .insert(config.id.clone(), Arc::new(ModelEntry::new(config)));
        }
        info!(count = self.entries.len(), "loaded model configs");
        self.entries.len()
    }

    /// Reflect a config write. Takes effect before this call returns.
    pub fn apply(&self, change: ConfigChange) {
        match change {
            ConfigChange::Upserted(config) => {
                debug!(model_id = %config.id, "model config changed, dropping cached clients");
                self.entries
                    .insert(config.id.clone(), Arc::new(ModelEntry::new(config)));
            }
            ConfigChange::Deleted(id) => {
                debug!(model_id = %id, "model config deleted");
                self.entries.remove(&id);
            }
        }
    }

    pub fn config(&self, id: &str) -> Option<ModelConfig> {
        self.entries.get(id).map(|e| e.config.clone())
    }

    pub fn configs(&self, model_type: Option<ModelType>) -> Vec<ModelConfig> {
        let mut configs: Vec<ModelConfig> = self
            .entries
            .iter()
            .map(|e| e.config.clone())
            .filter(|c| model_type.is_none_or(|t| c.model_type == t))
            .collect();
        configs.sort_by(|a, b| a.id.cmp(&b.id));
        configs
    }

    fn entry(&self, id: &str) -> Result<Arc<ModelEntry>, ConfigError> {
        self.entries
            .get(id)
            .map(|e| Arc::clone(e.value()))
            .ok_or_else(|| ConfigError::ModelNotFound(id.to_string()))
    }

    // ------------------------------------------------------------------
    // Cached lookups by config id
    // ------------------------------------------------------------------

    /// Streaming chat client for a config id.
    ///
    /// `Ok(None)` means the provider cannot stream or the client failed to
    /// build (logged). Validation errors are always returned.
    pub fn streaming_client(&self, id: &str) -> Result<Option<Arc<BoxLlmProvider>>, ConfigError> {
        self.cached_chat(id, Capability::StreamingChat)
    }

    /// Synchronous chat client for a config id.
    ///
    /// Shares its cache slot with [`Self::streaming_client`]: one provider
    /// client serves both call styles.
    pub fn chat_client(&self, id: &str) -> Result<Option<Arc<BoxLlmProvider>>, ConfigError> {
        self.cached_chat(id, Capability::Chat)
    }

    pub fn embedding_client(&self, id: &str) -> Result<Option<Arc<BoxEmbedder>>, ConfigError> {
        let entry = self.entry(id)?;
        let kind = catalog::validate(&entry.config)?;
        if !catalog::supports(kind, Capability::Embedding) {
            return Ok(None);
        }
        Ok(cached(&entry.embedding, || {
            self.construct_embedding(kind, &entry.config)
        }))
    }

    fn cached_chat(
        &self,
        id: &str,
        capability: Capability,
    ) -> Result<Option<Arc<BoxLlmProvider>>, ConfigError> {
        let entry = self.entry(id)?;
        let kind = catalog::validate(&entry.config)?;
        if !catalog::supports(kind, capability) {
            return Ok(None);
        }
        Ok(cached(&entry.chat, || self.construct_chat(kind, &entry.config)))
    }

    // ------------------------------------------------------------------
    // Uncached builds from a config value
    // ------------------------------------------------------------------

    pub fn build_streaming(
        &self,
        config: &ModelConfig,
    ) -> Result<Option<Arc<BoxLlmProvider>>, ConfigError> {
        self.build_chat_with(config, Capability::StreamingChat)
    }

    pub fn build_sync(
        &self,
        config: &ModelConfig,
    ) -> Result<Option<Arc<BoxLlmProvider>>, ConfigError> {
        self.build_chat_with(config, Capability::Chat)
    }

    pub fn build_embedding(
        &self,
        config: &ModelConfig,
    ) -> Result<Option<Arc<BoxEmbedder>>, ConfigError> {
        let kind = catalog::validate(config)?;
        if !catalog::supports(kind, Capability::Embedding) {
            return Ok(None);
        }
        Ok(self.construct_embedding(kind, config))
    }

    fn build_chat_with(
        &self,
        config: &ModelConfig,
        capability: Capability,
    ) -> Result<Option<Arc<BoxLlmProvider>>, ConfigError> {
        let kind = catalog::validate(config)?;
        if !catalog::supports(kind, capability) {
            return Ok(None);
        }
        Ok(self.construct_chat(kind, config))
    }

    fn construct_chat(&self, kind: ProviderKind, config: &ModelConfig) -> Option<Arc<BoxLlmProvider>> {
        match self.builder.build_chat(kind, config) {
            Ok(client) => {
                debug!(model_id = %config.id, provider = %kind, "built chat client");
                Some(Arc::new(client))
            }
            Err(e) => {
                error!(model_id = %config.id, provider = %kind, error = %e, "failed to build chat client");
                None
            }
        }
    }

    fn construct_embedding(&self, kind: ProviderKind, config: &ModelConfig) -> Option<Arc<BoxEmbedder>> {
        match self.builder.build_embedding(kind, config) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                error!(model_id = %config.id, provider = %kind, error = %e, "failed to build embedding client");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeBuilder, Script, chat_config};
    use confab_types::llm::Usage;
    use confab_types::provider::CredentialField;

    fn factory() -> ModelClientFactory<FakeBuilder> {
        let factory = ModelClientFactory::new(FakeBuilder::new(Script::reply(&["hi"], Usage::default())));
        factory.load(vec![chat_config("m1")]);
        factory
    }

    #[test]
    fn test_client_is_built_once_and_cached() {
        let factory = factory();
        let a = factory.streaming_client("m1").unwrap().unwrap();
        let b = factory.chat_client("m1").unwrap().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(factory.builder.build_count(), 1);
    }

    #[test]
    fn test_unknown_id_is_model_not_found() {
        let factory = factory();
        let err = factory.streaming_client("nope").unwrap_err();
        assert_eq!(err, ConfigError::ModelNotFound("nope".to_string()));
    }

    #[test]
    fn test_update_invalidates_before_next_lookup() {
        let factory = factory();
        factory.streaming_client("m1").unwrap().unwrap();

        let mut updated = chat_config("m1");
        updated.api_key = Some("sk-rotated".to_string());
        factory.apply(ConfigChange::Upserted(updated));
        factory.streaming_client("m1").unwrap().unwrap();

        let seen = factory.builder.seen_api_keys.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec![Some("sk-test".to_string()), Some("sk-rotated".to_string())]
        );
    }

    #[test]
    fn test_delete_removes_entry() {
        let factory = factory();
        factory.apply(ConfigChange::Deleted("m1".to_string()));
        assert!(matches!(
            factory.streaming_client("m1"),
            Err(ConfigError::ModelNotFound(_))
        ));
        assert!(factory.config("m1").is_none());
    }

    #[test]
    fn test_validation_error_propagates_and_nothing_is_built() {
        let factory = factory();
        let mut config = ModelConfig::new("ollama", "OLLAMA", "llama3");
        config.base_url = Some(" ".to_string());
        factory.apply(ConfigChange::Upserted(config));

        let err = factory.streaming_client("ollama").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingCredential { field: CredentialField::BaseUrl, .. }
        ));
        assert_eq!(factory.builder.build_count(), 0);
    }

    #[test]
    fn test_unknown_provider_propagates() {
        let factory = factory();
        let mut config = chat_config("odd");
        config.provider = "MISTRAL".to_string();
        assert!(matches!(
            factory.build_streaming(&config),
            Err(ConfigError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_build_failure_is_logged_as_none() {
        let factory = factory();
        let mut config = chat_config("broken");
        config.model = "broken".to_string();
        factory.apply(ConfigChange::Upserted(config));
        assert!(factory.streaming_client("broken").unwrap().is_none());
    }

    #[test]
    fn test_build_failure_is_not_cached() {
        let factory = factory();
        let mut config = chat_config("broken");
        config.model = "broken".to_string();
        factory.apply(ConfigChange::Upserted(config));

        assert!(factory.streaming_client("broken").unwrap().is_none());
        assert!(factory.chat_client("broken").unwrap().is_none());
        assert_eq!(factory.builder.build_count(), 2);
    }

    #[test]
    fn test_unsupported_capability_is_none_without_building() {
        let factory = factory();
        let mut config = chat_config("ds");
        config.provider = "DEEPSEEK".to_string();
        factory.apply(ConfigChange::Upserted(config));
        assert!(factory.embedding_client("ds").unwrap().is_none());
        assert_eq!(factory.builder.build_count(), 0);
    }

    #[test]
    fn test_embedding_client_for_supported_provider() {
        let factory = factory();
        let embedder = factory.embedding_client("m1").unwrap().unwrap();
        assert_eq!(embedder.model_name(), "gpt-test");
    }

    #[test]
    fn test_configs_filter_by_type() {
        let factory = factory();
        let mut embedding = chat_config("e1");
        embedding.model_type = ModelType::Embedding;
        factory.apply(ConfigChange::Upserted(embedding));
        assert_eq!(factory.configs(None).len(), 2);
        let chat = factory.configs(Some(ModelType::Chat));
        assert_eq!(chat.len(), 1);
        assert_eq!(chat[0].id, "m1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_lookups_build_once() {
        let factory = Arc::new(factory());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let factory = factory.clone();
            handles.push(tokio::spawn(async move {
                factory.streaming_client("m1").unwrap().unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(factory.builder.build_count(), 1);
    }
}
