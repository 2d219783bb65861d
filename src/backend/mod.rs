//! Chat storage backend
//!
//! Implements the storage half of the relay: the write path (`save`), the
//! read path (`query`) and synthetic group events (`synthetic`). All state
//! lives in an [`AppContext`] and a [`GroupStores`] owned by the backend, so
//! independent instances can coexist (one per test, for example).

mod query;
mod save;
pub mod synthetic;

pub use query::{plan_queries, SubQuery};

use std::path::Path;
use std::sync::Arc;

use crate::context::{AppContext, RequestContext};
use crate::error::RelayError;
use crate::store::GroupStores;

/// Storage backend for group chat events
pub struct ChatBackend {
    ctx: Arc<AppContext>,
    stores: Arc<GroupStores>,
}

impl ChatBackend {
    /// Open the sled environment at `db_path`
    pub fn open(
        ctx: Arc<AppContext>,
        db_path: impl AsRef<Path>,
        cache_capacity: u64,
    ) -> Result<Self, RelayError> {
        let stores = GroupStores::open(db_path, cache_capacity, Arc::clone(ctx.registry()))?;
        Ok(Self {
            ctx,
            stores: Arc::new(stores),
        })
    }

    /// Backend over a throwaway in-memory environment
    pub fn temporary(ctx: Arc<AppContext>) -> Result<Self, RelayError> {
        let stores = GroupStores::temporary(Arc::clone(ctx.registry()))?;
        Ok(Self {
            ctx,
            stores: Arc::new(stores),
        })
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.ctx
    }

    pub fn stores(&self) -> &GroupStores {
        &self.stores
    }

    /// Deletion is not supported; always fails
    pub fn delete_event(
        &self,
        _req: &RequestContext,
        _id: &str,
        _pubkey: &str,
    ) -> Result<(), RelayError> {
        Err(RelayError::Unimplemented("delete"))
    }

    /// Flush all trees to disk
    pub async fn flush(&self) -> Result<(), RelayError> {
        self.stores.flush().await
    }
}
