//! Application profile repository trait definition.

use confab_types::app::AppProfile;
use confab_types::error::RepositoryError;

/// Repository trait for [`AppProfile`] persistence.
pub trait AppProfileRepository: Send + Sync {
    fn list(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<AppProfile>, RepositoryError>> + Send;

    fn get(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<AppProfile>, RepositoryError>> + Send;

    fn create(
        &self,
        app: &AppProfile,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn update(
        &self,
        app: &AppProfile,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    fn delete(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
