//! Configuration for groups-relay
//!
//! Loaded from TOML. Groups are keyed by their path:
//!
//! ```toml
//! public_hostname = "groups.example.com"
//! private_key = "<64 hex chars>"
//!
//! [groups."/lobby"]
//! name = "Lobby"
//!
//! [groups."/vip"]
//! name = "VIP"
//! private = true
//! closed = true
//!
//! [groups."/vip".roles.admin]
//! permissions = ["add-user", "remove-user"]
//! members = ["<64 hex chars>"]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::RelayError;

/// Default database directory
pub fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("groups-relay")
        .join("groups.sled")
}

/// Relay configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Interface to bind the protocol server to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for the protocol server
    #[serde(default = "default_port")]
    pub port: u16,

    /// Hostname clients use to reach this relay; `g` tags must point at it
    #[serde(default)]
    pub public_hostname: String,

    /// sled database directory
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// Page cache for the sled environment, in bytes
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity_bytes: u64,

    /// Relay signing key (hex), used for synthetic group events
    #[serde(default)]
    pub private_key: String,

    /// Free-form description served by the protocol layer
    #[serde(default)]
    pub description: String,

    /// Hosted groups, by path
    #[serde(default)]
    pub groups: BTreeMap<String, GroupConfig>,
}

/// One hosted group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub picture: String,
    /// Only members may read messages and member lists
    #[serde(default)]
    pub private: bool,
    /// Only members may write
    #[serde(default)]
    pub closed: bool,
    #[serde(default)]
    pub roles: BTreeMap<String, RoleConfig>,
}

/// Role inside a group
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoleConfig {
    #[serde(default)]
    pub permissions: Vec<String>,
    /// Member public keys (hex)
    #[serde(default)]
    pub members: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5577
}

fn default_cache_capacity() -> u64 {
    64 * 1024 * 1024 // 64MB
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_hostname: String::new(),
            db_path: default_db_path(),
            cache_capacity_bytes: default_cache_capacity(),
            private_key: String::new(),
            description: String::new(),
            groups: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, RelayError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse config from a TOML string
    pub fn from_toml(content: &str) -> Result<Self, RelayError> {
        toml::from_str(content).map_err(|e| RelayError::Config(e.to_string()))
    }

    /// URL clients must put in the third slot of `g` tags
    pub fn service_url(&self) -> String {
        format!("wss://{}", self.public_hostname)
    }

    /// Address the protocol server binds to
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
