//! Event Acceptance Filter
//!
//! Pure pre-storage gate: only chat messages and actions, at most 10 000
//! bytes serialized, tagged with one or two group paths.

use crate::event::{is_group_path, Event, GroupKind, GROUP_TAG};

/// Largest accepted event, in bytes of compact JSON
pub const MAX_EVENT_SIZE: usize = 10_000;

/// Most groups a single event may be posted to
pub const MAX_GROUP_TAGS: usize = 2;

/// Why an event was turned away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    UnsupportedKind,
    TooLarge,
    GroupTagCount,
    MalformedGroupTag,
}

impl Rejection {
    pub fn reason(self) -> &'static str {
        match self {
            Rejection::UnsupportedKind => "only chat messages and actions are accepted",
            Rejection::TooLarge => "event is too large",
            Rejection::GroupTagCount => "event must name one or two groups",
            Rejection::MalformedGroupTag => "group tag must be a path starting with '/'",
        }
    }
}

/// Check an event against the relay's acceptance policy
pub fn check(event: &Event) -> Result<(), Rejection> {
    match GroupKind::from_kind(event.kind) {
        Some(kind) if kind.is_persisted() => {}
        _ => return Err(Rejection::UnsupportedKind),
    }

    if event.serialized_len() > MAX_EVENT_SIZE {
        return Err(Rejection::TooLarge);
    }

    let group_tags: Vec<_> = event.tags_named(GROUP_TAG).collect();
    if group_tags.is_empty() || group_tags.len() > MAX_GROUP_TAGS {
        return Err(Rejection::GroupTagCount);
    }
    if !group_tags
        .iter()
        .all(|t| t.get(1).map(|v| is_group_path(v)).unwrap_or(false))
    {
        return Err(Rejection::MalformedGroupTag);
    }

    Ok(())
}

/// `true` if the event may proceed to the write path
pub fn accept(event: &Event) -> bool {
    check(event).is_ok()
}
