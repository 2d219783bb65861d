//! Read path
//!
//! A filter is split into one sub-query per (kind, group). Each sub-query
//! runs on its own blocking worker and pushes into a shared bounded channel
//! that the caller drains as an [`EventStream`]. A failing sub-query is
//! logged and contributes nothing; its siblings carry on.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use super::synthetic::synthesize;
use super::ChatBackend;
use crate::context::{AppContext, RequestContext};
use crate::error::RelayError;
use crate::event::{is_group_path, Event, GroupKind};
use crate::filter::{Filter, QueryBounds};
use crate::store::GroupStores;
use crate::stream::EventStream;

/// One (kind, group) slice of a filter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubQuery {
    pub kind: GroupKind,
    pub group_id: String,
}

/// Split `filter` into sub-queries
///
/// Persisted kinds are scoped by `#g` values, synthetic kinds by `#d`
/// values; values that are not group paths and kinds this relay does not
/// know are ignored. A filter that scopes nothing fails with
/// `MustSpecifyGroup`.
pub fn plan_queries(filter: &Filter) -> Result<Vec<SubQuery>, RelayError> {
    let mut seen = HashSet::new();
    let mut plan = Vec::new();

    for kind in filter.kinds.iter().filter_map(|k| GroupKind::from_kind(*k)) {
        for group_id in filter.tag_values(kind.index_tag()).filter(|v| is_group_path(v)) {
            let sub = SubQuery {
                kind,
                group_id: group_id.to_string(),
            };
            if seen.insert(sub.clone()) {
                plan.push(sub);
            }
        }
    }

    if plan.is_empty() {
        return Err(RelayError::MustSpecifyGroup);
    }
    Ok(plan)
}

impl ChatBackend {
    /// Run `filter` and stream the matching events
    ///
    /// Must be called from within a tokio runtime. Dropping the returned
    /// stream, or cancelling the request, stops every worker.
    pub async fn query_events(
        &self,
        req: &RequestContext,
        filter: &Filter,
    ) -> Result<EventStream, RelayError> {
        let plan = plan_queries(filter)?;
        let bounds = filter.bounds();

        let runtime = Handle::current();
        let cancel = req.cancel_token().child_token();
        let (tx, stream) = EventStream::channel(cancel.clone());

        for sub in plan {
            let worker = Worker {
                ctx: Arc::clone(&self.ctx),
                stores: Arc::clone(&self.stores),
                authed: req.auth_status().map(str::to_string),
                bounds,
                tx: tx.clone(),
                cancel: cancel.clone(),
                runtime: runtime.clone(),
            };
            tokio::task::spawn_blocking(move || worker.run(sub));
        }

        Ok(stream)
    }
}

/// State a sub-query worker owns for its lifetime
struct Worker {
    ctx: Arc<AppContext>,
    stores: Arc<GroupStores>,
    authed: Option<String>,
    bounds: QueryBounds,
    tx: mpsc::Sender<Event>,
    cancel: CancellationToken,
    runtime: Handle,
}

impl Worker {
    fn run(self, sub: SubQuery) {
        match self.execute(&sub) {
            Ok(sent) => debug!(
                group = %sub.group_id,
                kind = sub.kind.kind(),
                sent,
                "Sub-query finished"
            ),
            Err(RelayError::Cancelled) => debug!(
                group = %sub.group_id,
                kind = sub.kind.kind(),
                "Sub-query cancelled"
            ),
            Err(e) if e.is_rejection() => warn!(
                group = %sub.group_id,
                kind = sub.kind.kind(),
                error = %e,
                "Sub-query skipped"
            ),
            Err(e) => error!(
                group = %sub.group_id,
                kind = sub.kind.kind(),
                error = %e,
                "Sub-query failed"
            ),
        }
    }

    /// Returns how many events were sent
    fn execute(&self, sub: &SubQuery) -> Result<usize, RelayError> {
        let registry = self.ctx.registry();
        let group = registry.get(&sub.group_id)?;

        if group.private && sub.kind != GroupKind::Metadata {
            let member = self
                .authed
                .as_deref()
                .map(|pk| group.is_member(pk))
                .unwrap_or(false);
            if !member {
                return Ok(0);
            }
        }

        if !sub.kind.is_persisted() {
            let event = synthesize(
                sub.kind,
                group,
                registry,
                self.ctx.relay_key(),
                self.ctx.started_at(),
            );
            return match event {
                Some(event) => self.send(event).map(|_| 1),
                None => Ok(0),
            };
        }

        let (store, _) = self.stores.handle(&sub.group_id)?;
        let QueryBounds {
            since,
            until,
            limit,
        } = self.bounds;

        let mut sent = 0;
        for item in store.scan_newest_first(sub.kind.kind(), since, until) {
            if sent >= limit {
                break;
            }
            if self.cancel.is_cancelled() {
                return Err(RelayError::Cancelled);
            }

            let (key, value) = item?;
            let event: Event = match serde_json::from_slice(&value) {
                Ok(event) => event,
                Err(e) => {
                    warn!(
                        group = %sub.group_id,
                        key = %key,
                        error = %e,
                        "Skipping undecodable event"
                    );
                    continue;
                }
            };

            self.send(event)?;
            sent += 1;
        }

        Ok(sent)
    }

    /// Blocks until the channel has room, the caller goes away, or the query
    /// is cancelled
    fn send(&self, event: Event) -> Result<(), RelayError> {
        let delivered = self.runtime.block_on(async {
            tokio::select! {
                _ = self.cancel.cancelled() => false,
                res = self.tx.send(event) => res.is_ok(),
            }
        });

        if delivered {
            Ok(())
        } else {
            Err(RelayError::Cancelled)
        }
    }
}
