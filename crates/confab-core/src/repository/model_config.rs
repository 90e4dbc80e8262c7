//! Model configuration repository trait definition.

use confab_types::error::RepositoryError;
use confab_types::provider::{ModelConfig, ModelType};

/// Repository trait for [`ModelConfig`] persistence.
///
/// Implementations live in confab-infra (e.g., SqliteModelConfigRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait ModelConfigRepository: Send + Sync {
    /// List configs, optionally restricted to one model type.
    fn list(
        &self,
        model_type: Option<ModelType>,
    ) -> impl std::future::Future<Output = Result<Vec<ModelConfig>, RepositoryError>> + Send;

    fn get(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ModelConfig>, RepositoryError>> + Send;

    /// Insert a new config. Fails with `Conflict` if the id exists.
    fn create(
        &self,
        config: &ModelConfig,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Replace an existing config. Fails with `NotFound` if the id is unknown.
    fn update(
        &self,
        config: &ModelConfig,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Delete a config. Fails with `NotFound` if the id is unknown.
    fn delete(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
