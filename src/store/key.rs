//! Store keys
//!
//! ```text
//! | kind: u16 BE | created_at: u32 BE | serial: u32 BE |
//!   0        2     2              6     6          10
//! ```
//!
//! Big-endian fields make byte order equal numeric order, so a tree sorted
//! by key is sorted by (kind, created_at, serial).

use std::fmt;

pub const STORE_KEY_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    pub kind: u16,
    pub created_at: u32,
    pub serial: u32,
}

impl StoreKey {
    pub fn new(kind: u16, created_at: u32, serial: u32) -> Self {
        Self {
            kind,
            created_at,
            serial,
        }
    }

    /// Smallest key of `kind` at `created_at`
    pub fn lowest(kind: u16, created_at: u32) -> Self {
        Self::new(kind, created_at, 0)
    }

    /// Largest key of `kind` at `created_at`
    pub fn highest(kind: u16, created_at: u32) -> Self {
        Self::new(kind, created_at, u32::MAX)
    }

    pub fn to_bytes(&self) -> [u8; STORE_KEY_LEN] {
        let mut key = [0u8; STORE_KEY_LEN];
        key[0..2].copy_from_slice(&self.kind.to_be_bytes());
        key[2..6].copy_from_slice(&self.created_at.to_be_bytes());
        key[6..10].copy_from_slice(&self.serial.to_be_bytes());
        key
    }

    /// Decode a key read back from a tree; `None` if the length is wrong
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let key: &[u8; STORE_KEY_LEN] = bytes.try_into().ok()?;
        Some(Self {
            kind: u16::from_be_bytes([key[0], key[1]]),
            created_at: u32::from_be_bytes([key[2], key[3], key[4], key[5]]),
            serial: u32::from_be_bytes([key[6], key[7], key[8], key[9]]),
        })
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.created_at, self.serial)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let key = StoreKey::new(9, 0x0102_0304, 7);
        assert_eq!(key.to_bytes(), [0, 9, 1, 2, 3, 4, 0, 0, 0, 7]);
        assert_eq!(StoreKey::from_bytes(&key.to_bytes()), Some(key));
        assert_eq!(StoreKey::from_bytes(&[0u8; 6]), None);
    }

    #[test]
    fn test_byte_order_matches_field_order() {
        let keys = [
            StoreKey::new(9, 100, 5),
            StoreKey::new(9, 100, 6),
            StoreKey::new(9, 101, 0),
            StoreKey::new(9, 256, 0),
            StoreKey::new(9000, 0, 0),
        ];
        for pair in keys.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].to_bytes() < pair[1].to_bytes());
        }
    }

    #[test]
    fn test_bounds_bracket_timestamp() {
        let inner = StoreKey::new(9, 50, 1234);
        assert!(StoreKey::lowest(9, 50).to_bytes() <= inner.to_bytes());
        assert!(StoreKey::highest(9, 50).to_bytes() >= inner.to_bytes());
        assert!(StoreKey::highest(9, 49).to_bytes() < StoreKey::lowest(9, 50).to_bytes());
    }
}
