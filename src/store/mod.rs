//! Per-group event storage
//!
//! ```text
//! groups.sled/
//! ├── "/"          # one tree per group id
//! ├── "/lobby"     #   key:   StoreKey (kind, created_at, serial)
//! └── "/vip"       #   value: compact JSON of the event
//! ```

pub mod handles;
pub mod key;

pub use handles::GroupStores;
pub use key::{StoreKey, STORE_KEY_LEN};

use crate::error::RelayError;

/// Handle to one group's tree
#[derive(Clone, Debug)]
pub struct GroupStore {
    group_id: String,
    tree: sled::Tree,
}

impl GroupStore {
    pub(crate) fn new(group_id: &str, tree: sled::Tree) -> Self {
        Self {
            group_id: group_id.to_string(),
            tree,
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn put(&self, key: StoreKey, value: &[u8]) -> Result<(), RelayError> {
        self.tree.insert(key.to_bytes(), value)?;
        Ok(())
    }

    /// Entries of `kind` with `since <= created_at <= until`, newest first
    pub fn scan_newest_first(
        &self,
        kind: u16,
        since: u32,
        until: u32,
    ) -> impl Iterator<Item = Result<(StoreKey, sled::IVec), RelayError>> {
        let lower = StoreKey::lowest(kind, since).to_bytes();
        let upper = StoreKey::highest(kind, until).to_bytes();

        // an inverted range would make sled panic
        let range = if since <= until {
            Some(self.tree.range(lower..=upper).rev())
        } else {
            None
        };

        range.into_iter().flatten().map(|item| {
            let (key, value) = item?;
            let key = StoreKey::from_bytes(&key)
                .ok_or_else(|| RelayError::Internal(format!("malformed store key {key:?}")))?;
            Ok((key, value))
        })
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
