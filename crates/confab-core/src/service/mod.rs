//! Management services for model configs, app profiles and conversations.
//!
//! Each service writes through its repository and then refreshes the
//! matching process-wide cache before returning. Writes to the same id hold
//! a per-id lock across both steps, so the cache always ends up matching
//! the last stored value.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

pub mod app;
pub mod conversation;
pub mod model_config;

/// One async lock per record id.
#[derive(Default)]
pub(crate) struct WriteLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl WriteLocks {
    /// Wait for exclusive write access to `id`.
    pub(crate) async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(id.to_string()).or_default().clone();
        lock.lock_owned().await
    }
}
