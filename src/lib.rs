//! Groups Relay - storage backend for relay-hosted chat groups
//!
//! Hosts a fixed set of groups declared in config. Chat messages and
//! moderation actions are persisted per group; group metadata, roles,
//! members and sub-group listings are synthesized from config on read and
//! signed with the relay key.
//!
//! ## Architecture
//!
//! - **Registry**: immutable group definitions, validated at boot
//! - **Store**: one sled tree per group, keys ordered by (kind, time, serial)
//! - **Write path**: acceptance gate, then all-or-nothing policy check, then writes
//! - **Read path**: one worker per (kind, group), merged into a single stream
//!
//! ## Storage Layout
//!
//! ```text
//! groups.sled/
//! ├── "/"            # tree per group id
//! ├── "/lobby"       # key   = kind:u16 | created_at:u32 | serial:u32 (big-endian)
//! └── "/vip"         # value = event JSON
//! ```

pub mod accept;
pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod event;
pub mod filter;
pub mod groups;
pub mod relay;
pub mod store;
pub mod stream;

// Re-exports
pub use backend::ChatBackend;
pub use config::Config;
pub use context::{AppContext, RequestContext};
pub use error::RelayError;
pub use event::{Event, GroupKind};
pub use filter::Filter;
pub use groups::{Group, GroupRegistry};
pub use relay::Relay;
pub use stream::EventStream;
