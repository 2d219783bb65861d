//! Group Registry - static group definitions derived from config
//!
//! Built once at startup and read-only afterwards. Validation is fail-fast:
//! a relay with a malformed group definition refuses to start.

use std::collections::BTreeMap;

use crate::config::{Config, GroupConfig};
use crate::error::RelayError;
use crate::event::{is_group_path, is_hex64};

/// Upper bound on hosted groups, one sled tree each
pub const MAX_GROUPS: usize = 256;

/// Role inside a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    pub permissions: Vec<String>,
    pub members: Vec<String>,
}

/// A hosted group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub picture: String,
    pub private: bool,
    pub closed: bool,
    /// Roles keyed by name
    pub roles: BTreeMap<String, Role>,
}

impl Group {
    /// Whether `pubkey` is listed in any role of this group
    pub fn is_member(&self, pubkey: &str) -> bool {
        self.roles
            .values()
            .any(|role| role.members.iter().any(|m| m.eq_ignore_ascii_case(pubkey)))
    }

    /// `(pubkey, role)` pairs, sorted by role then listing order
    pub fn members(&self) -> impl Iterator<Item = (&str, &str)> {
        self.roles.values().flat_map(|role| {
            role.members
                .iter()
                .map(move |m| (m.as_str(), role.name.as_str()))
        })
    }

    /// `(role, permissions)` pairs, sorted by role
    pub fn permissions(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.roles
            .values()
            .map(|role| (role.name.as_str(), role.permissions.as_slice()))
    }

    /// Whether writes require a listed, authenticated author
    pub fn is_restricted(&self) -> bool {
        self.private || self.closed
    }

    fn from_config(id: &str, config: &GroupConfig) -> Result<Self, RelayError> {
        if !is_group_path(id) {
            return Err(RelayError::Config(format!(
                "group id '{id}' must be a path starting with '/'"
            )));
        }

        let mut roles = BTreeMap::new();
        for (name, role) in &config.roles {
            if name.trim().is_empty() {
                return Err(RelayError::Config(format!(
                    "group '{id}' has a role with a blank name"
                )));
            }
            if role.permissions.iter().any(|p| p.trim().is_empty()) {
                return Err(RelayError::Config(format!(
                    "role '{name}' in group '{id}' has a blank permission"
                )));
            }
            if let Some(bad) = role.members.iter().find(|m| !is_hex64(m)) {
                return Err(RelayError::Config(format!(
                    "member '{bad}' of role '{name}' in group '{id}' is not a 64-char hex key"
                )));
            }

            roles.insert(
                name.clone(),
                Role {
                    name: name.clone(),
                    permissions: role.permissions.clone(),
                    members: role.members.iter().map(|m| m.to_ascii_lowercase()).collect(),
                },
            );
        }

        Ok(Self {
            id: id.to_string(),
            name: config.name.clone(),
            picture: config.picture.clone(),
            private: config.private,
            closed: config.closed,
            roles,
        })
    }
}

/// Read-only map of group id to group
#[derive(Debug, Clone)]
pub struct GroupRegistry {
    groups: BTreeMap<String, Group>,
}

impl GroupRegistry {
    /// Build and validate the registry from config
    pub fn from_config(config: &Config) -> Result<Self, RelayError> {
        if config.groups.is_empty() {
            return Err(RelayError::Config("no groups configured".to_string()));
        }
        if config.groups.len() > MAX_GROUPS {
            return Err(RelayError::Config(format!(
                "{} groups configured, at most {MAX_GROUPS} are supported",
                config.groups.len()
            )));
        }

        let groups = config
            .groups
            .iter()
            .map(|(id, group)| Group::from_config(id, group).map(|g| (id.clone(), g)))
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(Self { groups })
    }

    pub fn lookup(&self, id: &str) -> Option<&Group> {
        self.groups.get(id)
    }

    /// Like [`lookup`](Self::lookup) but with the relay's rejection error
    pub fn get(&self, id: &str) -> Result<&Group, RelayError> {
        self.lookup(id)
            .ok_or_else(|| RelayError::NotAllowed(id.to_string()))
    }

    /// Groups whose id starts with `parent`, in id order, excluding `parent`
    ///
    /// Plain string prefix: `/a` lists both `/a/b` and `/ab`.
    pub fn children<'a>(&'a self, parent: &'a str) -> impl Iterator<Item = &'a Group> + 'a {
        self.groups
            .values()
            .filter(move |g| g.id != parent && g.id.starts_with(parent))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
