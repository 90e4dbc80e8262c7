//! AppStore: process-wide cache of application profiles.
//!
//! Loaded once at startup and refreshed synchronously by `AppService` after
//! every write. Readers never block on each other.

use dashmap::DashMap;
use tracing::info;

use confab_types::app::AppProfile;

#[derive(Debug, Default)]
pub struct AppStore {
    apps: DashMap<String, AppProfile>,
}

impl AppStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole store.
    pub fn load(&self, apps: impl IntoIterator<Item = AppProfile>) -> usize {
        self.apps.clear();
        for app in apps {
            self.apps.insert(app.id.clone(), app);
        }
        info!(count = self.apps.len(), "loaded app profiles");
        self.apps.len()
    }

    /// Profile for an app id. A miss means "no profile", never an error.
    pub fn get(&self, app_id: &str) -> Option<AppProfile> {
        self.apps.get(app_id).map(|a| a.clone())
    }

    pub fn upsert(&self, app: AppProfile) {
        self.apps.insert(app.id.clone(), app);
    }

    pub fn remove(&self, app_id: &str) {
        self.apps.remove(app_id);
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
