//! # registry
//!
//! Owns every live [`Lease`] and its expiry timer. All mutations (allocate,
//! free, timer expiry) go through one lock, so whichever of them gets there
//! first removes the lease and the others find it already gone.
use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    num::NonZeroU32,
    sync::{Arc, Weak},
    time::SystemTime,
};

use config::ServerName;
use parking_lot::Mutex;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};
use tracing::{debug, info, trace};

use crate::{
    error::{LeaseError, LeaseResult},
    metrics,
    types::{CallerId, ConversationId, Lease, LeaseId},
};

/// A lease reached its expiry time before anything else removed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiredEvent(pub Lease);

impl ExpiredEvent {
    pub fn occupant(&self) -> &CallerId {
        self.0.occupant()
    }
    pub fn server(&self) -> &ServerName {
        self.0.server()
    }
    pub fn conversation(&self) -> &ConversationId {
        self.0.conversation()
    }
}

/// receiving half for expiry events, drained by the transport side
pub type ExpiryReceiver = mpsc::UnboundedReceiver<ExpiredEvent>;

#[derive(Debug, Clone)]
pub struct LeaseRegistry {
    inner: Arc<Mutex<RegistryState>>,
    expired_tx: mpsc::UnboundedSender<ExpiredEvent>,
}

#[derive(Debug, Default)]
struct RegistryState {
    next_id: u64,
    /// keyed by `LeaseId`, which only grows, so iteration is oldest lease first
    leases: BTreeMap<LeaseId, Entry>,
    by_occupant: HashMap<CallerId, LeaseId>,
}

#[derive(Debug)]
struct Entry {
    lease: Lease,
    timer: JoinHandle<()>,
}

impl RegistryState {
    fn lease_of(&self, occupant: &CallerId) -> Option<&Lease> {
        self.by_occupant
            .get(occupant)
            .and_then(|id| self.leases.get(id))
            .map(|entry| &entry.lease)
    }

    fn is_leased(&self, server: &ServerName) -> bool {
        self.leases.values().any(|entry| &entry.lease.server == server)
    }

    fn next_id(&mut self) -> LeaseId {
        self.next_id += 1;
        LeaseId(self.next_id)
    }

    fn insert(&mut self, lease: Lease, timer: JoinHandle<()>) {
        self.by_occupant.insert(lease.occupant.clone(), lease.id);
        self.leases.insert(lease.id, Entry { lease, timer });
        metrics::LEASES_ACTIVE.inc();
    }

    fn remove(&mut self, id: LeaseId) -> Option<Entry> {
        let entry = self.leases.remove(&id)?;
        let indexed = self.by_occupant.remove(&entry.lease.occupant);
        debug_assert_eq!(indexed, Some(id), "occupant index out of sync");
        metrics::LEASES_ACTIVE.dec();
        Some(entry)
    }
}

impl Drop for RegistryState {
    fn drop(&mut self) {
        for entry in self.leases.values() {
            entry.timer.abort();
        }
    }
}

impl LeaseRegistry {
    /// create an empty registry and the receiver its expiry events are sent on
    pub fn new() -> (Self, ExpiryReceiver) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: Arc::new(Mutex::new(RegistryState::default())),
                expired_tx,
            },
            expired_rx,
        )
    }

    /// Record a lease of `server` for `occupant` and start its expiry timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn allocate(
        &self,
        occupant: &CallerId,
        server: &ServerName,
        conversation: &ConversationId,
        hours: NonZeroU32,
    ) -> LeaseResult<Lease> {
        let mut state = self.inner.lock();
        if let Some(existing) = state.lease_of(occupant) {
            return Err(LeaseError::AlreadyLeased(Box::new(existing.clone())));
        }
        if state.is_leased(server) {
            return Err(LeaseError::ServerOccupied(server.clone()));
        }

        let id = state.next_id();
        let duration = config::hours(hours);
        let lease = Lease {
            id,
            occupant: occupant.clone(),
            server: server.clone(),
            conversation: conversation.clone(),
            hours,
            expires_at: SystemTime::now() + duration,
        };
        let timer = self.spawn_timer(id, Instant::now() + duration);
        state.insert(lease.clone(), timer);
        debug!(%id, %occupant, %server, ?duration, "lease recorded");
        Ok(lease)
    }

    /// Remove the occupant's lease and cancel its timer. `None` if there was nothing
    /// to free, so freeing twice is harmless.
    pub fn free(&self, occupant: &CallerId) -> Option<Lease> {
        let mut state = self.inner.lock();
        let id = state.by_occupant.get(occupant).copied()?;
        let entry = state.remove(id)?;
        entry.timer.abort();
        Some(entry.lease)
    }

    /// Like [`free`], but only if `id` is still the live lease.
    ///
    /// [`free`]: LeaseRegistry::free
    pub fn free_lease(&self, id: LeaseId) -> Option<Lease> {
        let entry = self.inner.lock().remove(id)?;
        entry.timer.abort();
        Some(entry.lease)
    }

    pub fn lease_of(&self, occupant: &CallerId) -> Option<Lease> {
        self.inner.lock().lease_of(occupant).cloned()
    }

    /// current occupants, oldest lease first
    pub fn all_occupants(&self) -> Vec<CallerId> {
        self.inner
            .lock()
            .leases
            .values()
            .map(|entry| entry.lease.occupant.clone())
            .collect()
    }

    /// snapshot of all live leases, oldest first
    pub fn leases(&self) -> Vec<Lease> {
        self.inner
            .lock()
            .leases
            .values()
            .map(|entry| entry.lease.clone())
            .collect()
    }

    /// servers currently leased, derived from the live leases
    pub fn occupied_servers(&self) -> BTreeSet<ServerName> {
        self.inner
            .lock()
            .leases
            .values()
            .map(|entry| entry.lease.server.clone())
            .collect()
    }

    pub fn is_leased(&self, server: &ServerName) -> bool {
        self.inner.lock().is_leased(server)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().leases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn_timer(&self, id: LeaseId, deadline: Instant) -> JoinHandle<()> {
        let state = Arc::downgrade(&self.inner);
        let expired_tx = self.expired_tx.clone();
        tokio::spawn(async move {
            time::sleep_until(deadline).await;
            expire(&state, &expired_tx, id);
        })
    }
}

/// timer callback. Removes lease `id` only if it is still live and reports it
fn expire(
    state: &Weak<Mutex<RegistryState>>,
    expired_tx: &mpsc::UnboundedSender<ExpiredEvent>,
    id: LeaseId,
) -> bool {
    let Some(state) = state.upgrade() else {
        return false;
    };
    // bind before matching so the lock is released before sending
    let removed = state.lock().remove(id);
    match removed {
        Some(entry) => {
            let lease = entry.lease;
            info!(%id, occupant = %lease.occupant, server = %lease.server, "lease expired");
            metrics::LEASES_EXPIRED.inc();
            if expired_tx.send(ExpiredEvent(lease)).is_err() {
                debug!("expiry receiver dropped, event discarded");
            }
            true
        }
        None => {
            trace!(%id, "timer fired for a lease that was already removed");
            false
        }
    }
}
