//! Synthetic group events
//!
//! Metadata, roles, members and sub-group listings are never stored. They
//! are rebuilt from the registry on every query, signed with the relay key
//! and stamped with the process start time so repeated reads in one run
//! return the same event.

use ed25519_dalek::SigningKey;

use crate::event::{Event, GroupKind, Tag, DEFINITION_TAG, GROUP_TAG};
use crate::groups::{Group, GroupRegistry};

fn tag<const N: usize>(parts: [&str; N]) -> Tag {
    parts.iter().map(|p| p.to_string()).collect()
}

/// Tags describing `group` for a synthetic `kind`, after the `d` tag
fn body_tags(kind: GroupKind, group: &Group, registry: &GroupRegistry) -> Vec<Tag> {
    match kind {
        GroupKind::Metadata => {
            let mut tags = Vec::new();
            if !group.name.is_empty() {
                tags.push(tag(["name", group.name.as_str()]));
            }
            if !group.picture.is_empty() {
                tags.push(tag(["picture", group.picture.as_str()]));
            }
            if group.private {
                tags.push(tag(["private"]));
            }
            if group.closed {
                tags.push(tag(["closed"]));
            }
            tags
        }
        GroupKind::Members => group
            .members()
            .map(|(pubkey, role)| tag(["m", pubkey, role]))
            .collect(),
        GroupKind::Roles => group
            .permissions()
            .map(|(role, permissions)| {
                let mut t = tag(["role", role]);
                t.extend(permissions.iter().cloned());
                t
            })
            .collect(),
        GroupKind::SubGroups => registry
            .children(&group.id)
            .map(|child| tag([GROUP_TAG, child.id.as_str()]))
            .collect(),
        GroupKind::Message | GroupKind::Action => Vec::new(),
    }
}

/// Build and sign the synthetic event of `kind` for `group`
///
/// Returns `None` for persisted kinds.
pub fn synthesize(
    kind: GroupKind,
    group: &Group,
    registry: &GroupRegistry,
    relay_key: &SigningKey,
    created_at: u32,
) -> Option<Event> {
    if kind.is_persisted() {
        return None;
    }

    let mut tags = vec![tag([DEFINITION_TAG, group.id.as_str()])];
    tags.extend(body_tags(kind, group, registry));

    Some(Event::new(kind.kind(), created_at, tags, "").signed(relay_key))
}
