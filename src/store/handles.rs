//! Group Store Handle Cache
//!
//! One sled environment per relay, one tree per group. Trees are opened on
//! first use and kept for the life of the process. The same mutex guards
//! tree creation and the serial counter, so keys handed out by
//! [`GroupStores::next_key`] are unique and increasing across all writers.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use super::key::StoreKey;
use super::GroupStore;
use crate::error::RelayError;
use crate::groups::{Group, GroupRegistry};

#[derive(Default)]
struct HandleState {
    trees: HashMap<String, sled::Tree>,
    serial: u32,
}

/// Lazily opened per-group trees
pub struct GroupStores {
    db: sled::Db,
    registry: Arc<GroupRegistry>,
    state: Mutex<HandleState>,
}

impl GroupStores {
    /// Open or create the environment at `path`
    pub fn open(
        path: impl AsRef<Path>,
        cache_capacity: u64,
        registry: Arc<GroupRegistry>,
    ) -> Result<Self, RelayError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = sled::Config::new()
            .path(path.as_ref())
            .cache_capacity(cache_capacity)
            .open()?;

        info!(
            path = %path.as_ref().display(),
            groups = registry.len(),
            "Opened group store"
        );

        Ok(Self::with_db(db, registry))
    }

    /// In-memory environment, removed on drop
    pub fn temporary(registry: Arc<GroupRegistry>) -> Result<Self, RelayError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self::with_db(db, registry))
    }

    fn with_db(db: sled::Db, registry: Arc<GroupRegistry>) -> Self {
        Self {
            db,
            registry,
            state: Mutex::new(HandleState::default()),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HandleState>, RelayError> {
        self.state
            .lock()
            .map_err(|_| RelayError::Internal("group store lock poisoned".to_string()))
    }

    pub fn registry(&self) -> &GroupRegistry {
        &self.registry
    }

    /// Handle for `group_id`, creating its tree on first access
    ///
    /// Fails with `NotAllowed` for ids missing from the registry.
    pub fn handle(&self, group_id: &str) -> Result<(GroupStore, &Group), RelayError> {
        let group = self.registry.get(group_id)?;

        let mut state = self.lock()?;
        if let Some(tree) = state.trees.get(group_id) {
            return Ok((GroupStore::new(group_id, tree.clone()), group));
        }

        let tree = self.db.open_tree(group_id.as_bytes())?;
        state.trees.insert(group_id.to_string(), tree.clone());
        debug!(group = %group_id, "Opened group tree");

        Ok((GroupStore::new(group_id, tree), group))
    }

    /// Next key for an event of `kind` created at `created_at`
    pub fn next_key(&self, kind: u16, created_at: u32) -> Result<StoreKey, RelayError> {
        let mut state = self.lock()?;
        let serial = state.serial;
        state.serial = state.serial.wrapping_add(1);
        Ok(StoreKey::new(kind, created_at, serial))
    }

    /// Number of trees opened so far
    pub fn open_count(&self) -> usize {
        self.lock().map(|s| s.trees.len()).unwrap_or_default()
    }

    /// Flush dirty pages to disk
    pub async fn flush(&self) -> Result<(), RelayError> {
        self.db.flush_async().await?;
        Ok(())
    }
}
