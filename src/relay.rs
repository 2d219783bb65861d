//! Relay facade
//!
//! The surface the protocol layer talks to: acceptance, save, query and
//! delete, plus a `publish` convenience that runs the whole inbound
//! pipeline (verify, accept, save) for one event.

use std::sync::Arc;
use tracing::{info, warn};

use crate::accept;
use crate::backend::ChatBackend;
use crate::config::Config;
use crate::context::{AppContext, RequestContext};
use crate::error::RelayError;
use crate::event::Event;
use crate::filter::Filter;
use crate::stream::EventStream;

/// Group chat relay backed by per-group sled trees
pub struct Relay {
    backend: ChatBackend,
}

impl Relay {
    pub const NAME: &'static str = "GroupsRelay";

    /// Validate `config` and open the on-disk store at `config.db_path`
    pub fn open(config: &Config) -> Result<Self, RelayError> {
        let ctx = Arc::new(AppContext::new(config)?);
        let backend = ChatBackend::open(ctx, &config.db_path, config.cache_capacity_bytes)?;
        info!(name = Self::NAME, listen = %config.listen_addr(), "Relay ready");
        Ok(Self { backend })
    }

    /// Same as [`open`](Self::open) but over an in-memory store
    pub fn temporary(config: &Config) -> Result<Self, RelayError> {
        let ctx = Arc::new(AppContext::new(config)?);
        Ok(Self {
            backend: ChatBackend::temporary(ctx)?,
        })
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn context(&self) -> &AppContext {
        self.backend.context()
    }

    /// Acceptance gate; rejected events are logged
    pub fn accept_event(&self, event: &Event) -> bool {
        match accept::check(event) {
            Ok(()) => true,
            Err(rejection) => {
                warn!(
                    id = %event.id,
                    kind = event.kind,
                    reason = rejection.reason(),
                    "Event rejected"
                );
                false
            }
        }
    }

    pub async fn save_event(&self, req: &RequestContext, event: &Event) -> Result<(), RelayError> {
        self.backend.save_event(req, event).await
    }

    pub async fn query_events(
        &self,
        req: &RequestContext,
        filter: &Filter,
    ) -> Result<EventStream, RelayError> {
        self.backend.query_events(req, filter).await
    }

    pub fn delete_event(
        &self,
        req: &RequestContext,
        id: &str,
        pubkey: &str,
    ) -> Result<(), RelayError> {
        self.backend.delete_event(req, id, pubkey)
    }

    /// Verify, accept and save an inbound event
    pub async fn publish(&self, req: &RequestContext, event: &Event) -> Result<(), RelayError> {
        event.verify()?;
        if let Err(rejection) = accept::check(event) {
            warn!(
                id = %event.id,
                kind = event.kind,
                reason = rejection.reason(),
                "Event rejected"
            );
            return Err(RelayError::Rejected(rejection.reason().to_string()));
        }
        self.save_event(req, event).await
    }

    /// Flush pending writes
    pub async fn shutdown(&self) -> Result<(), RelayError> {
        self.backend.flush().await?;
        info!(name = Self::NAME, "Relay stopped");
        Ok(())
    }
}
