//! Write path
//!
//! Saving is two-phase. Every group tag is resolved, authorized and checked
//! for this relay's URL first; only if all of them pass is anything written.
//! Writes then go group by group, each under its own fresh serial. A storage
//! failure part-way leaves earlier groups written.

use tracing::debug;

use super::ChatBackend;
use crate::context::RequestContext;
use crate::error::RelayError;
use crate::event::{Event, GroupKind, Tag};
use crate::groups::Group;
use crate::store::GroupStore;

impl ChatBackend {
    /// Store a chat message or action in every group it is tagged with
    pub async fn save_event(&self, req: &RequestContext, event: &Event) -> Result<(), RelayError> {
        if req.is_cancelled() {
            return Err(RelayError::Cancelled);
        }

        match GroupKind::from_kind(event.kind) {
            Some(kind) if kind.is_persisted() => {}
            _ => {
                return Err(RelayError::Rejected(format!(
                    "kind {} is not stored by this relay",
                    event.kind
                )))
            }
        }

        let mut targets: Vec<GroupStore> = Vec::new();
        for tag in event.group_tags() {
            let group_id = tag[1].as_str();
            if targets.iter().any(|s| s.group_id() == group_id) {
                continue;
            }

            let (store, group) = self.stores.handle(group_id)?;
            authorize_write(req, group)?;
            self.check_relay_url(tag)?;
            targets.push(store);
        }

        if targets.is_empty() {
            return Err(RelayError::InvalidTag(
                "event has no \"g\" tag naming a group".to_string(),
            ));
        }

        let value = serde_json::to_vec(event)?;
        for store in &targets {
            let key = self.stores.next_key(event.kind, event.created_at)?;
            store.put(key, &value)?;
            debug!(
                group = %store.group_id(),
                kind = event.kind,
                key = %key,
                id = %event.id,
                "Event stored"
            );
        }

        Ok(())
    }

    /// The third element of the `g` tag must name this relay, so events
    /// signed for another relay cannot be replayed here
    fn check_relay_url(&self, tag: &Tag) -> Result<(), RelayError> {
        let expected = self.ctx.service_url();
        if tag.len() != 3 || tag[2] != expected {
            return Err(RelayError::InvalidTag(format!(
                "\"g\" tag relay url is not present or is incorrect, should be {expected}"
            )));
        }
        Ok(())
    }
}

/// Closed and private groups only take writes from authenticated members
fn authorize_write(req: &RequestContext, group: &Group) -> Result<(), RelayError> {
    if !group.is_restricted() {
        return Ok(());
    }

    let Some(pubkey) = req.auth_status() else {
        return Err(RelayError::Restricted("you're not authed".to_string()));
    };

    if group.is_member(pubkey) {
        Ok(())
    } else {
        Err(RelayError::Restricted(
            "you are not allowed to write".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GroupConfig, RoleConfig};
    use crate::context::AppContext;
    use crate::event::{KIND_CHAT_ACTION, KIND_CHAT_MESSAGE, KIND_GROUP_METADATA};
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use std::sync::Arc;

    const RELAY: &str = "wss://relay.test";

    fn backend(member: &str) -> ChatBackend {
        let mut config = Config {
            public_hostname: "relay.test".to_string(),
            private_key: "22".repeat(32),
            ..Default::default()
        };
        config.groups.insert("/lobby".to_string(), GroupConfig::default());

        let mut closed = GroupConfig {
            closed: true,
            ..Default::default()
        };
        closed.roles.insert(
            "member".to_string(),
            RoleConfig {
                permissions: vec!["write".to_string()],
                members: vec![member.to_string()],
            },
        );
        config.groups.insert("/closed".to_string(), closed);

        let ctx = Arc::new(AppContext::new(&config).unwrap());
        ChatBackend::temporary(ctx).unwrap()
    }

    fn message(key: &SigningKey, tags: Vec<Tag>) -> Event {
        Event::new(KIND_CHAT_MESSAGE, 1_700_000_000, tags, "hi").signed(key)
    }

    fn g(group: &str, relay: &str) -> Tag {
        vec!["g".into(), group.into(), relay.into()]
    }

    fn stored(backend: &ChatBackend, group: &str) -> usize {
        backend.stores().handle(group).unwrap().0.len()
    }

    #[tokio::test]
    async fn test_open_group_accepts_anyone() {
        let key = SigningKey::generate(&mut OsRng);
        let backend = backend(&"ab".repeat(32));

        backend
            .save_event(&RequestContext::anonymous(), &message(&key, vec![g("/lobby", RELAY)]))
            .await
            .unwrap();
        assert_eq!(stored(&backend, "/lobby"), 1);
    }

    #[tokio::test]
    async fn test_unknown_group_not_allowed() {
        let key = SigningKey::generate(&mut OsRng);
        let backend = backend(&"ab".repeat(32));
        let err = backend
            .save_event(&RequestContext::anonymous(), &message(&key, vec![g("/nope", RELAY)]))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::NotAllowed(_)));
    }

    #[tokio::test]
    async fn test_wrong_relay_url_is_invalid() {
        let key = SigningKey::generate(&mut OsRng);
        let backend = backend(&"ab".repeat(32));
        let anon = RequestContext::anonymous();

        let foreign = message(&key, vec![g("/lobby", "wss://elsewhere")]);
        assert!(matches!(
            backend.save_event(&anon, &foreign).await,
            Err(RelayError::InvalidTag(_))
        ));

        let missing = message(&key, vec![vec!["g".into(), "/lobby".into()]]);
        assert!(matches!(
            backend.save_event(&anon, &missing).await,
            Err(RelayError::InvalidTag(_))
        ));
        assert_eq!(stored(&backend, "/lobby"), 0);
    }

    #[tokio::test]
    async fn test_closed_group_requires_listed_auth() {
        let key = SigningKey::generate(&mut OsRng);
        let member = hex::encode(key.verifying_key().as_bytes());
        let backend = backend(&member);
        let event = message(&key, vec![g("/closed", RELAY)]);

        let err = backend
            .save_event(&RequestContext::anonymous(), &event)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "restricted: you're not authed");

        let stranger = RequestContext::authenticated("cd".repeat(32));
        let err = backend.save_event(&stranger, &event).await.unwrap_err();
        assert_eq!(err.to_string(), "restricted: you are not allowed to write");

        backend
            .save_event(&RequestContext::authenticated(&member), &event)
            .await
            .unwrap();
        assert_eq!(stored(&backend, "/closed"), 1);
    }

    #[tokio::test]
    async fn test_policy_failure_on_any_group_stores_nothing() {
        let key = SigningKey::generate(&mut OsRng);
        let backend = backend(&"ab".repeat(32));
        let event = message(&key, vec![g("/lobby", RELAY), g("/closed", RELAY)]);

        assert!(backend
            .save_event(&RequestContext::anonymous(), &event)
            .await
            .is_err());
        assert_eq!(stored(&backend, "/lobby"), 0);
    }

    #[tokio::test]
    async fn test_multi_group_and_duplicate_tags() {
        let key = SigningKey::generate(&mut OsRng);
        let member = hex::encode(key.verifying_key().as_bytes());
        let backend = backend(&member);
        let event = message(
            &key,
            vec![g("/lobby", RELAY), g("/closed", RELAY), g("/lobby", RELAY)],
        );

        backend
            .save_event(&RequestContext::authenticated(&member), &event)
            .await
            .unwrap();
        assert_eq!(stored(&backend, "/lobby"), 1);
        assert_eq!(stored(&backend, "/closed"), 1);
    }

    #[tokio::test]
    async fn test_actions_are_stored() {
        let key = SigningKey::generate(&mut OsRng);
        let backend = backend(&"ab".repeat(32));
        let action =
            Event::new(KIND_CHAT_ACTION, 1_700_000_000, vec![g("/lobby", RELAY)], "").signed(&key);

        backend
            .save_event(&RequestContext::anonymous(), &action)
            .await
            .unwrap();
        assert_eq!(stored(&backend, "/lobby"), 1);
    }

    #[tokio::test]
    async fn test_synthetic_kinds_are_refused() {
        let key = SigningKey::generate(&mut OsRng);
        let backend = backend(&"ab".repeat(32));
        let event =
            Event::new(KIND_GROUP_METADATA, 1, vec![g("/lobby", RELAY)], "").signed(&key);
        assert!(matches!(
            backend.save_event(&RequestContext::anonymous(), &event).await,
            Err(RelayError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_cancelled_request() {
        let key = SigningKey::generate(&mut OsRng);
        let backend = backend(&"ab".repeat(32));
        let req = RequestContext::anonymous();
        req.cancel_token().cancel();

        let err = backend
            .save_event(&req, &message(&key, vec![g("/lobby", RELAY)]))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Cancelled));
    }
}
