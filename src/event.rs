//! Signed events
//!
//! An event id is the SHA-256 of the compact JSON array
//! `[0, pubkey, created_at, kind, tags, content]`; the signature is Ed25519
//! over the 32 id bytes. Keys, ids and signatures travel as lowercase hex.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::RelayError;

/// A tag is a name followed by its values, e.g. `["g", "/lobby", "wss://relay"]`
pub type Tag = Vec<String>;

/// Chat message posted to a group
pub const KIND_CHAT_MESSAGE: u16 = 9;
/// Moderation/administrative action on a group
pub const KIND_CHAT_ACTION: u16 = 9000;
/// Group name, picture and flags
pub const KIND_GROUP_METADATA: u16 = 39000;
/// Roles and their permissions
pub const KIND_GROUP_ROLES: u16 = 39001;
/// Members and the role each holds
pub const KIND_GROUP_MEMBERS: u16 = 39002;
/// Child groups
pub const KIND_GROUP_SUBGROUPS: u16 = 39003;

/// Tag naming the group a persisted event belongs to
pub const GROUP_TAG: &str = "g";
/// Tag naming the group a synthetic event describes
pub const DEFINITION_TAG: &str = "d";

/// The event kinds this relay knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKind {
    Message,
    Action,
    Metadata,
    Roles,
    Members,
    SubGroups,
}

impl GroupKind {
    pub fn from_kind(kind: u16) -> Option<Self> {
        match kind {
            KIND_CHAT_MESSAGE => Some(Self::Message),
            KIND_CHAT_ACTION => Some(Self::Action),
            KIND_GROUP_METADATA => Some(Self::Metadata),
            KIND_GROUP_ROLES => Some(Self::Roles),
            KIND_GROUP_MEMBERS => Some(Self::Members),
            KIND_GROUP_SUBGROUPS => Some(Self::SubGroups),
            _ => None,
        }
    }

    pub fn kind(self) -> u16 {
        match self {
            Self::Message => KIND_CHAT_MESSAGE,
            Self::Action => KIND_CHAT_ACTION,
            Self::Metadata => KIND_GROUP_METADATA,
            Self::Roles => KIND_GROUP_ROLES,
            Self::Members => KIND_GROUP_MEMBERS,
            Self::SubGroups => KIND_GROUP_SUBGROUPS,
        }
    }

    /// Messages and actions live in the store; everything else is computed
    /// from the registry at query time.
    pub fn is_persisted(self) -> bool {
        matches!(self, Self::Message | Self::Action)
    }

    /// Tag namespace a filter uses to scope this kind to a group
    pub fn index_tag(self) -> &'static str {
        if self.is_persisted() {
            GROUP_TAG
        } else {
            DEFINITION_TAG
        }
    }
}

/// Whether `value` is shaped like a group path (`/`, `/lobby`, `/a/b`)
pub fn is_group_path(value: &str) -> bool {
    value.starts_with('/')
}

/// Whether `value` is 64 lowercase-or-uppercase hex characters
pub fn is_hex64(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Current unix time in seconds
pub fn unix_now() -> u32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| saturating_secs(d.as_secs()))
        .unwrap_or_default()
}

/// Timestamps past 2106 pin to `u32::MAX` rather than wrapping
fn saturating_secs(secs: u64) -> u32 {
    u32::try_from(secs).unwrap_or(u32::MAX)
}

/// Parse a hex-encoded 32-byte Ed25519 secret key
pub fn parse_signing_key(hex_key: &str) -> Result<SigningKey, RelayError> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| RelayError::InvalidKey(format!("private key is not hex: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| RelayError::InvalidKey("private key must be 32 bytes".to_string()))?;
    Ok(SigningKey::from_bytes(&bytes))
}

/// Protocol event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub pubkey: String,
    pub created_at: u32,
    pub kind: u16,
    pub tags: Vec<Tag>,
    pub content: String,
    pub sig: String,
}

impl Event {
    /// Create an unsigned event; call [`Event::signed`] before publishing
    pub fn new(kind: u16, created_at: u32, tags: Vec<Tag>, content: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            pubkey: String::new(),
            created_at,
            kind,
            tags,
            content: content.into(),
            sig: String::new(),
        }
    }

    /// Fill in pubkey, id and signature from `key`
    pub fn signed(mut self, key: &SigningKey) -> Self {
        self.pubkey = hex::encode(key.verifying_key().as_bytes());
        let id = self.id_bytes();
        self.id = hex::encode(id);
        self.sig = hex::encode(key.sign(&id).to_bytes());
        self
    }

    /// SHA-256 over the canonical serialization
    pub fn id_bytes(&self) -> [u8; 32] {
        let canonical = serde_json::json!([
            0,
            self.pubkey,
            self.created_at,
            self.kind,
            self.tags,
            self.content
        ]);
        Sha256::digest(canonical.to_string().as_bytes()).into()
    }

    /// Check that the id matches the content and the signature matches the id
    pub fn verify(&self) -> Result<(), RelayError> {
        let id = self.id_bytes();
        if hex::encode(id) != self.id.to_ascii_lowercase() {
            return Err(RelayError::InvalidEvent("id does not match event".to_string()));
        }

        let pubkey: [u8; 32] = hex::decode(&self.pubkey)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| RelayError::InvalidEvent("malformed pubkey".to_string()))?;
        let verifying_key = VerifyingKey::from_bytes(&pubkey)
            .map_err(|e| RelayError::InvalidEvent(format!("bad pubkey: {e}")))?;

        let sig: [u8; 64] = hex::decode(&self.sig)
            .ok()
            .and_then(|b| b.try_into().ok())
            .ok_or_else(|| RelayError::InvalidEvent("malformed signature".to_string()))?;

        verifying_key
            .verify(&id, &Signature::from_bytes(&sig))
            .map_err(|_| RelayError::InvalidEvent("signature is invalid".to_string()))
    }

    /// Size of the compact JSON encoding
    pub fn serialized_len(&self) -> usize {
        serde_json::to_vec(self).map(|b| b.len()).unwrap_or(usize::MAX)
    }

    /// All tags named `name`
    pub fn tags_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Tag> + 'a {
        self.tags
            .iter()
            .filter(move |t| t.first().map(String::as_str) == Some(name))
    }

    /// `g` tags whose value is a group path
    pub fn group_tags(&self) -> impl Iterator<Item = &Tag> {
        self.tags_named(GROUP_TAG)
            .filter(|t| t.get(1).map(|v| is_group_path(v)).unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    fn message(group: &str) -> Event {
        Event::new(
            KIND_CHAT_MESSAGE,
            1_700_000_000,
            vec![vec!["g".into(), group.into(), "wss://relay.test".into()]],
            "hello",
        )
    }

    #[test]
    fn test_sign_and_verify() {
        let key = SigningKey::generate(&mut OsRng);
        let event = message("/lobby").signed(&key);

        assert!(is_hex64(&event.id));
        assert!(is_hex64(&event.pubkey));
        assert_eq!(event.sig.len(), 128);
        event.verify().unwrap();
    }

    #[test]
    fn test_tampered_content_fails_verification() {
        let key = SigningKey::generate(&mut OsRng);
        let mut event = message("/lobby").signed(&key);
        event.content = "goodbye".into();
        assert!(matches!(event.verify(), Err(RelayError::InvalidEvent(_))));
    }

    #[test]
    fn test_foreign_signature_fails_verification() {
        let key = SigningKey::generate(&mut OsRng);
        let other = SigningKey::generate(&mut OsRng);
        let mut event = message("/lobby").signed(&key);
        event.sig = message("/lobby").signed(&other).sig;
        assert!(event.verify().is_err());
    }

    #[test]
    fn test_group_tags_skip_non_paths() {
        let mut event = message("/lobby");
        event.tags.push(vec!["g".into(), "lobby".into()]);
        event.tags.push(vec!["g".into()]);
        event.tags.push(vec!["e".into(), "/not-a-group".into()]);

        let groups: Vec<_> = event.group_tags().map(|t| t[1].as_str()).collect();
        assert_eq!(groups, vec!["/lobby"]);
    }

    #[test]
    fn test_kind_classes() {
        assert!(GroupKind::Message.is_persisted());
        assert!(GroupKind::Action.is_persisted());
        assert!(!GroupKind::Metadata.is_persisted());
        assert_eq!(GroupKind::Members.index_tag(), "d");
        assert_eq!(GroupKind::from_kind(1), None);
        assert_eq!(
            GroupKind::from_kind(KIND_GROUP_SUBGROUPS).map(GroupKind::kind),
            Some(KIND_GROUP_SUBGROUPS)
        );
    }

    #[test]
    fn test_timestamps_saturate() {
        assert_eq!(saturating_secs(1_700_000_000), 1_700_000_000);
        assert_eq!(saturating_secs(u64::from(u32::MAX) + 1), u32::MAX);
        assert_eq!(saturating_secs(u64::MAX), u32::MAX);
        assert!(unix_now() > 1_600_000_000);
    }

    #[test]
    fn test_parse_signing_key() {
        let key = SigningKey::generate(&mut OsRng);
        let parsed = parse_signing_key(&hex::encode(key.to_bytes())).unwrap();
        assert_eq!(parsed.verifying_key(), key.verifying_key());

        assert!(parse_signing_key("zz").is_err());
        assert!(parse_signing_key("abcd").is_err());
    }
}
