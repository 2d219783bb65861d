//! Read filters
//!
//! Only the fields the backend consumes are modelled: kinds, tag values,
//! time bounds and limit. Tag filters arrive as `"#<name>": [values]`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::event::unix_now;

/// Returned when a filter has no limit
pub const DEFAULT_LIMIT: usize = 200;
/// Hard cap on events per sub-query
pub const MAX_LIMIT: usize = 300;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub kinds: Vec<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,

    /// `#g`, `#d`, ...; other unknown keys land here too and are ignored
    #[serde(flatten)]
    pub tags: BTreeMap<String, serde_json::Value>,
}

/// Bounds resolved against the clock and the relay's limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryBounds {
    pub since: u32,
    pub until: u32,
    pub limit: usize,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kinds.push(kind);
        self
    }

    /// Add a value to the `#name` tag filter
    pub fn tag(mut self, name: &str, value: &str) -> Self {
        let entry = self
            .tags
            .entry(format!("#{name}"))
            .or_insert_with(|| serde_json::Value::Array(Vec::new()));
        if let serde_json::Value::Array(values) = entry {
            values.push(serde_json::Value::String(value.to_string()));
        }
        self
    }

    pub fn since(mut self, since: u32) -> Self {
        self.since = Some(since);
        self
    }

    pub fn until(mut self, until: u32) -> Self {
        self.until = Some(until);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// String values of the `#name` tag filter
    pub fn tag_values<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + 'a {
        self.tags
            .get(&format!("#{name}"))
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter_map(|v| v.as_str())
    }

    /// `until` defaults to now, `since` to 0; limit is 200 when absent or
    /// zero and never above 300
    pub fn bounds(&self) -> QueryBounds {
        let limit = match self.limit {
            None | Some(0) => DEFAULT_LIMIT,
            Some(n) => n.min(MAX_LIMIT),
        };
        QueryBounds {
            since: self.since.unwrap_or(0),
            until: self.until.unwrap_or_else(unix_now),
            limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_protocol_json() {
        let filter: Filter = serde_json::from_str(
            r##"{"kinds":[9,39000],"#g":["/lobby","/vip"],"#d":["/"],"since":10,"limit":5,"authors":["ab"]}"##,
        )
        .unwrap();

        assert_eq!(filter.kinds, vec![9, 39000]);
        assert_eq!(filter.tag_values("g").collect::<Vec<_>>(), vec!["/lobby", "/vip"]);
        assert_eq!(filter.tag_values("d").collect::<Vec<_>>(), vec!["/"]);
        assert_eq!(filter.tag_values("e").count(), 0);
        assert_eq!(filter.since, Some(10));
    }

    #[test]
    fn test_builder_matches_json() {
        let built = Filter::new().kind(9).tag("g", "/lobby").limit(3);
        let parsed: Filter =
            serde_json::from_str(r##"{"kinds":[9],"#g":["/lobby"],"limit":3}"##).unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_limit_clamping() {
        assert_eq!(Filter::new().bounds().limit, DEFAULT_LIMIT);
        assert_eq!(Filter::new().limit(0).bounds().limit, DEFAULT_LIMIT);
        assert_eq!(Filter::new().limit(7).bounds().limit, 7);
        assert_eq!(Filter::new().limit(10_000).bounds().limit, MAX_LIMIT);
    }

    #[test]
    fn test_time_defaults() {
        let before = unix_now();
        let bounds = Filter::new().bounds();
        assert_eq!(bounds.since, 0);
        assert!(bounds.until >= before);

        let bounds = Filter::new().since(5).until(9).bounds();
        assert_eq!((bounds.since, bounds.until), (5, 9));
    }
}
