//! Application state wiring all services together.
//!
//! Core services are generic over repository and client-builder traits;
//! AppState pins them to the SQLite repositories and real provider clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use confab_core::app::AppStore;
use confab_core::chat::ChatOrchestrator;
use confab_core::memory::conversation::ConversationMemory;
use confab_core::provider::factory::ModelClientFactory;
use confab_core::service::app::AppService;
use confab_core::service::conversation::ConversationService;
use confab_core::service::model_config::ModelConfigService;
use confab_infra::config::{load_global_config, resolve_data_dir, resolve_database_url};
use confab_infra::llm::ProviderClientBuilder;
use confab_infra::sqlite::app::SqliteAppProfileRepository;
use confab_infra::sqlite::conversation::SqliteConversationRepository;
use confab_infra::sqlite::model_config::SqliteModelConfigRepository;
use confab_infra::sqlite::pool::DatabasePool;
use confab_types::config::GlobalConfig;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteOrchestrator = ChatOrchestrator<SqliteConversationRepository, ProviderClientBuilder>;

pub type ConcreteModelService = ModelConfigService<SqliteModelConfigRepository, ProviderClientBuilder>;

pub type ConcreteAppService = AppService<SqliteAppProfileRepository>;

pub type ConcreteConversationService = ConversationService<SqliteConversationRepository>;

pub type ConcreteMemory = ConversationMemory<SqliteConversationRepository>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ConcreteOrchestrator>,
    pub models: Arc<ConcreteModelService>,
    pub apps: Arc<ConcreteAppService>,
    pub conversations: Arc<ConcreteConversationService>,
    pub memory: Arc<ConcreteMemory>,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize from the environment: resolve the data dir, read
    /// `config.toml`, open the database and load caches.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;

        let config = load_global_config(&data_dir).await;
        let database_url = resolve_database_url(&data_dir);
        Self::open(data_dir, &database_url, config).await
    }

    /// Wire every service over the database at `database_url`.
    pub async fn open(
        data_dir: PathBuf,
        database_url: &str,
        config: GlobalConfig,
    ) -> anyhow::Result<Self> {
        let pool = DatabasePool::new(database_url)
            .await
            .with_context(|| format!("failed to open database {database_url}"))?;

        let factory = Arc::new(ModelClientFactory::new(
            ProviderClientBuilder::from_settings(&config.provider),
        ));
        let models = ModelConfigService::new(
            SqliteModelConfigRepository::new(pool.clone()),
            Arc::clone(&factory),
        );
        let model_count = models
            .load_all()
            .await
            .context("failed to load model configs")?;

        let store = Arc::new(AppStore::new());
        let apps = AppService::new(SqliteAppProfileRepository::new(pool.clone()), Arc::clone(&store));
        let app_count = apps.load_store().await.context("failed to load app profiles")?;

        let memory = Arc::new(ConversationMemory::new(
            Arc::new(SqliteConversationRepository::new(pool)),
            config.chat.memory_max_messages,
        ));
        let conversations =
            ConversationService::new(Arc::clone(&memory), config.chat.preview_max_messages);
        let orchestrator = ChatOrchestrator::new(
            Arc::clone(&memory),
            factory,
            store,
            config.chat.clone(),
        );

        debug!(models = model_count, apps = app_count, "application state ready");

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            models: Arc::new(models),
            apps: Arc::new(apps),
            conversations: Arc::new(conversations),
            memory,
            config: Arc::new(config),
            data_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Start the background task that drops idle conversation windows.
    ///
    /// Runs every quarter of the idle limit (at least once a second).
    pub fn spawn_memory_sweeper(&self) -> JoinHandle<()> {
        let memory = Arc::clone(&self.memory);
        let max_idle = self.config.chat.memory_idle();
        let period = (max_idle / 4).max(Duration::from_secs(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = memory.evict_idle(max_idle);
                if evicted > 0 {
                    info!(evicted, resident = memory.resident(), "evicted idle conversation windows");
                }
            }
        })
    }
}

#[cfg(test)]
pub(crate) async fn test_state() -> (AppState, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("test.db").display());
    let state = AppState::open(dir.path().to_path_buf(), &url, GlobalConfig::default())
        .await
        .unwrap();
    (state, dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_starts_with_empty_caches() {
        let (state, _dir) = test_state().await;
        assert!(state.models.factory().configs(None).is_empty());
        assert!(state.apps.store().is_empty());
        assert_eq!(state.memory.resident(), 0);
        assert_eq!(state.orchestrator.config().memory_max_messages, 20);
    }

    #[tokio::test]
    async fn test_sweeper_can_be_aborted() {
        let (state, _dir) = test_state().await;
        let handle = state.spawn_memory_sweeper();
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
