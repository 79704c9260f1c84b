//! # reclaim
//!
//! When every server is leased, each occupant is asked whether they are done.
//! Asking doesn't block anyone; answers arrive later as `y`/`n` replies.
//! Each query remembers the [`LeaseId`] it was about, so a reply that arrives
//! after that lease was freed or expired does nothing.
use std::{collections::HashMap, time::SystemTime};

use config::ServerName;
use parking_lot::Mutex;
use tracing::debug;

use crate::{
    registry::LeaseRegistry,
    types::{CallerId, Lease, LeaseId},
};

/// an unanswered "are you done?" sent to one occupant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReclaimQuery {
    pub occupant: CallerId,
    pub server: ServerName,
    pub lease: LeaseId,
    pub asked_at: SystemTime,
}

/// what a `y`/`n` reply amounted to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// no live query for this occupant
    Ignored,
    /// yes, the lease was freed
    Released(Lease),
    /// no, the occupant keeps the lease
    Retained(Lease),
}

#[derive(Debug, Default)]
pub struct ReclaimCoordinator {
    pending: Mutex<HashMap<CallerId, PendingReclaimQuery>>,
}

impl ReclaimCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask every current occupant, oldest lease first. Returns the queries so
    /// the caller can deliver them.
    pub fn broadcast(&self, registry: &LeaseRegistry) -> Vec<PendingReclaimQuery> {
        let asked_at = SystemTime::now();
        let queries = registry
            .leases()
            .into_iter()
            .map(|lease| PendingReclaimQuery {
                occupant: lease.occupant,
                server: lease.server,
                lease: lease.id,
                asked_at,
            })
            .collect::<Vec<_>>();

        let mut pending = self.pending.lock();
        // every live occupant is asked again below, anything else is stale
        pending.clear();
        pending.extend(queries.iter().map(|q| (q.occupant.clone(), q.clone())));
        debug!(count = queries.len(), "reclaim queries recorded");
        queries
    }

    pub fn handle_reply(
        &self,
        registry: &LeaseRegistry,
        occupant: &CallerId,
        affirmative: bool,
    ) -> ReplyOutcome {
        let Some(query) = self.pending.lock().remove(occupant) else {
            debug!(%occupant, "reply without a pending reclaim query");
            return ReplyOutcome::Ignored;
        };

        let outcome = if affirmative {
            registry.free_lease(query.lease).map(ReplyOutcome::Released)
        } else {
            registry
                .lease_of(occupant)
                .filter(|lease| lease.id() == query.lease)
                .map(ReplyOutcome::Retained)
        };
        outcome.unwrap_or_else(|| {
            debug!(%occupant, lease = %query.lease, "reclaim query outlived its lease");
            ReplyOutcome::Ignored
        })
    }

    /// drop the occupant's query, used when the lease ends some other way
    pub fn forget(&self, occupant: &CallerId) -> Option<PendingReclaimQuery> {
        self.pending.lock().remove(occupant)
    }

    /// drop the query about lease `id`, if any. A newer query for the same
    /// occupant is left alone
    pub fn forget_lease(&self, id: LeaseId) -> Option<PendingReclaimQuery> {
        let mut pending = self.pending.lock();
        let occupant = pending
            .iter()
            .find_map(|(occupant, query)| (query.lease == id).then(|| occupant.clone()))?;
        pending.remove(&occupant)
    }

    pub fn pending(&self, occupant: &CallerId) -> Option<PendingReclaimQuery> {
        self.pending.lock().get(occupant).cloned()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}
