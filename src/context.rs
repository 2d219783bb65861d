//! Application and request contexts
//!
//! `AppContext` is built once at startup from config and shared by
//! reference; `RequestContext` is built per request by the protocol layer
//! and carries the caller's authentication status and cancellation.

use ed25519_dalek::SigningKey;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::RelayError;
use crate::event::{parse_signing_key, unix_now};
use crate::groups::GroupRegistry;

/// Everything derived from config that the backend needs at runtime
pub struct AppContext {
    registry: Arc<GroupRegistry>,
    relay_key: SigningKey,
    service_url: String,
    description: String,
    /// Timestamp stamped on synthetic events for this run
    started_at: u32,
}

impl AppContext {
    /// Validate config and build the context; fails on any boot-time violation
    pub fn new(config: &Config) -> Result<Self, RelayError> {
        if config.public_hostname.trim().is_empty() {
            return Err(RelayError::Config("public_hostname is required".to_string()));
        }

        let registry = Arc::new(GroupRegistry::from_config(config)?);
        let relay_key = parse_signing_key(&config.private_key)?;

        let ctx = Self {
            registry,
            relay_key,
            service_url: config.service_url(),
            description: config.description.clone(),
            started_at: unix_now(),
        };

        info!(
            service_url = %ctx.service_url,
            groups = ctx.registry.len(),
            relay_pubkey = %ctx.relay_pubkey(),
            "Relay context initialized"
        );

        Ok(ctx)
    }

    /// Override the synthetic-event timestamp
    pub fn with_started_at(mut self, started_at: u32) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn registry(&self) -> &Arc<GroupRegistry> {
        &self.registry
    }

    pub fn relay_key(&self) -> &SigningKey {
        &self.relay_key
    }

    pub fn relay_pubkey(&self) -> String {
        hex::encode(self.relay_key.verifying_key().as_bytes())
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn started_at(&self) -> u32 {
        self.started_at
    }
}

/// Per-request state supplied by the protocol layer
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    authed_pubkey: Option<String>,
    cancel: CancellationToken,
}

impl RequestContext {
    /// Caller that has not completed authentication
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Caller authenticated as `pubkey` (hex)
    pub fn authenticated(pubkey: impl Into<String>) -> Self {
        Self {
            authed_pubkey: Some(pubkey.into().to_ascii_lowercase()),
            cancel: CancellationToken::new(),
        }
    }

    /// Tie this request to an outer cancellation (e.g. the connection)
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Authenticated pubkey, if any
    pub fn auth_status(&self) -> Option<&str> {
        self.authed_pubkey.as_deref()
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}
