//! Application profile management.

use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use confab_types::app::AppProfile;
use confab_types::error::{ManagementError, RepositoryError};

use crate::app::AppStore;
use crate::repository::app::AppProfileRepository;
use crate::service::WriteLocks;

pub struct AppService<A: AppProfileRepository> {
    repo: A,
    store: Arc<AppStore>,
    writes: WriteLocks,
}

impl<A: AppProfileRepository> AppService<A> {
    pub fn new(repo: A, store: Arc<AppStore>) -> Self {
        Self {
            repo,
            store,
            writes: WriteLocks::default(),
        }
    }

    pub fn store(&self) -> &Arc<AppStore> {
        &self.store
    }

    /// Fill the store from storage. Called once at startup.
    pub async fn load_store(&self) -> Result<usize, RepositoryError> {
        let apps = self.repo.list().await?;
        Ok(self.store.load(apps))
    }

    pub async fn list(&self) -> Result<Vec<AppProfile>, RepositoryError> {
        self.repo.list().await
    }

    pub async fn get(&self, id: &str) -> Result<AppProfile, ManagementError> {
        Ok(self.repo.get(id).await?.ok_or(RepositoryError::NotFound)?)
    }

    pub async fn create(&self, mut app: AppProfile) -> Result<AppProfile, ManagementError> {
        if app.id.trim().is_empty() {
            app.id = Uuid::now_v7().simple().to_string();
        }
        check_name(&app)?;
        let _write = self.writes.lock(&app.id).await;
        self.repo.create(&app).await?;
        self.store.upsert(app.clone());
        info!(app_id = %app.id, "created app profile");
        Ok(app)
    }

    pub async fn update(&self, app: AppProfile) -> Result<AppProfile, ManagementError> {
        check_name(&app)?;
        let _write = self.writes.lock(&app.id).await;
        self.repo.update(&app).await?;
        self.store.upsert(app.clone());
        info!(app_id = %app.id, "updated app profile");
        Ok(app)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ManagementError> {
        let _write = self.writes.lock(id).await;
        self.repo.delete(id).await?;
        self.store.remove(id);
        info!(app_id = %id, "deleted app profile");
        Ok(())
    }
}

fn check_name(app: &AppProfile) -> Result<(), ManagementError> {
    if app.name.trim().is_empty() {
        return Err(ManagementError::InvalidInput(
            "app name must not be empty".to_string(),
        ));
    }
    Ok(())
}
