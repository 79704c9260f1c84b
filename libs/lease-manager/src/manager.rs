use std::{num::NonZeroU32, sync::Arc};

use config::{ServerName, StagingConfig};
use tracing::{debug, info, instrument, warn};

use crate::{
    command::Command,
    error::LeaseError,
    metrics,
    outcome::{Broadcast, LeaseEvent, Notice, Outcome},
    pool::ServerPool,
    reclaim::{ReclaimCoordinator, ReplyOutcome},
    registry::{ExpiredEvent, ExpiryReceiver, LeaseRegistry},
    types::{CallerId, ConversationId, Lease, print_time},
};

pub const POOL_FULL: &str =
    "All servers are currently occupied. We are asking the current holders if they are done.";
pub const NO_LEASE: &str = "You currently do not have an assigned server to free";
pub const NO_PENDING_QUERY: &str = "There is no pending question for you to answer";
pub const INTERNAL_ERROR: &str = "Something went wrong allocating a server, please try again";

/// Entry point for commands. Owns the pool, the registry and the reclaim
/// coordinator; every state change happens inside [`handle`] or an expiry
/// timer.
///
/// [`handle`]: LeaseManager::handle
#[derive(Debug)]
pub struct LeaseManager {
    cfg: Arc<StagingConfig>,
    pool: ServerPool,
    registry: LeaseRegistry,
    reclaim: ReclaimCoordinator,
}

impl LeaseManager {
    /// Expiry events arrive on the returned receiver, pass them to
    /// [`handle_expired`].
    ///
    /// [`handle_expired`]: LeaseManager::handle_expired
    pub fn new(cfg: Arc<StagingConfig>) -> (Self, ExpiryReceiver) {
        let (registry, expired_rx) = LeaseRegistry::new();
        let pool = ServerPool::new(cfg.catalog().iter().cloned());
        (
            Self {
                cfg,
                pool,
                registry,
                reclaim: ReclaimCoordinator::new(),
            },
            expired_rx,
        )
    }

    pub fn config(&self) -> &StagingConfig {
        &self.cfg
    }
    pub fn pool(&self) -> &ServerPool {
        &self.pool
    }
    pub fn registry(&self) -> &LeaseRegistry {
        &self.registry
    }
    pub fn reclaim(&self) -> &ReclaimCoordinator {
        &self.reclaim
    }

    /// Apply one command from `occupant`. Never fails; problems become the
    /// reply text.
    ///
    /// Must be called from within a tokio runtime, allocation starts a timer.
    #[instrument(level = "debug", skip_all, fields(%occupant, %conversation))]
    pub fn handle(
        &self,
        text: &str,
        occupant: &CallerId,
        conversation: &ConversationId,
    ) -> Outcome {
        match Command::parse(text) {
            Command::Allocate { hours } => self.allocate(occupant, conversation, hours),
            Command::Free => self.free(occupant),
            Command::Reply { affirmative } => self.reply(occupant, affirmative),
            Command::Unrecognized(text) => {
                metrics::UNRECOGNIZED_COMMANDS.inc();
                Outcome::reply(format!(
                    "Not sure what you mean by {text}. Try using 'allocate' and 'free' commands"
                ))
            }
        }
    }

    /// Drop any reclaim query about the expired lease and build the
    /// announcement, sent where the lease was requested
    pub fn handle_expired(&self, ev: &ExpiredEvent) -> Broadcast {
        if self.reclaim.forget_lease(ev.0.id()).is_some() {
            debug!(occupant = %ev.occupant(), "dropped reclaim query for expired lease");
        }
        let name = self.cfg.display_name(ev.server());
        Broadcast {
            conversation: ev.conversation().clone(),
            text: format!(
                "{name} lease for {} has expired, {name} is now free!",
                ev.occupant()
            ),
        }
    }

    fn allocate(
        &self,
        occupant: &CallerId,
        conversation: &ConversationId,
        requested: Option<NonZeroU32>,
    ) -> Outcome {
        if let Some(lease) = self.registry.lease_of(occupant) {
            return self.error_outcome(LeaseError::AlreadyLeased(Box::new(lease)));
        }
        let hours = self.cfg.lease_hours(requested);

        let Some(server) = self.pool.find_vacant(&self.registry) else {
            metrics::POOL_EXHAUSTED.inc();
            let queries = self.reclaim.broadcast(&self.registry);
            metrics::RECLAIM_QUERIES_SENT.inc_by(queries.len() as u64);
            info!(asked = queries.len(), "all servers occupied, asking occupants");
            let notices = queries
                .iter()
                .map(|query| Notice {
                    to: query.occupant.clone(),
                    text: self.reclaim_query(&query.server),
                })
                .collect();
            return Outcome::reply(POOL_FULL)
                .notices(notices)
                .event(LeaseEvent::ReclaimRequested {
                    requester: occupant.clone(),
                    queries,
                });
        };

        match self.registry.allocate(occupant, &server, conversation, hours) {
            Ok(lease) => {
                metrics::LEASES_ALLOCATED.inc();
                info!(
                    %server,
                    %hours,
                    expires_at = %print_time(lease.expires_at()),
                    "lease allocated"
                );
                Outcome::reply(format!(
                    "You have allocated {} for {hours}hrs",
                    self.cfg.display_name(&server)
                ))
                .event(LeaseEvent::Allocated(lease))
            }
            Err(err) => self.error_outcome(err),
        }
    }

    fn free(&self, occupant: &CallerId) -> Outcome {
        match self
            .registry
            .free(occupant)
            .ok_or_else(|| LeaseError::NoActiveLease(occupant.clone()))
        {
            Ok(lease) => {
                self.reclaim.forget(occupant);
                metrics::LEASES_FREED.inc();
                info!(server = %lease.server(), "lease freed");
                let name = self.cfg.display_name(lease.server());
                Outcome::reply(format!("You have freed {name}"))
                    .broadcast(lease.conversation().clone(), self.now_free(&lease))
                    .event(LeaseEvent::Freed(lease))
            }
            Err(err) => self.error_outcome(err),
        }
    }

    fn reply(&self, occupant: &CallerId, affirmative: bool) -> Outcome {
        match self.reclaim.handle_reply(&self.registry, occupant, affirmative) {
            ReplyOutcome::Released(lease) => {
                metrics::LEASES_RECLAIMED.inc();
                info!(server = %lease.server(), "lease released after reclaim query");
                let name = self.cfg.display_name(lease.server());
                Outcome::reply(format!("Thanks! You have released {name}"))
                    .broadcast(lease.conversation().clone(), self.now_free(&lease))
                    .event(LeaseEvent::Reclaimed(lease))
            }
            ReplyOutcome::Retained(lease) => {
                debug!(server = %lease.server(), "occupant keeps lease");
                Outcome::reply(format!(
                    "Okay, you can keep using {}",
                    self.cfg.display_name(lease.server())
                ))
            }
            ReplyOutcome::Ignored => Outcome::reply(NO_PENDING_QUERY),
        }
    }

    fn error_outcome(&self, err: LeaseError) -> Outcome {
        match &err {
            LeaseError::AlreadyLeased(lease) => {
                debug!(%err, "refusing second lease");
                Outcome::reply(format!(
                    "You already have {} until {}. Free it before allocating another server.",
                    self.cfg.display_name(lease.server()),
                    print_time(lease.expires_at())
                ))
            }
            LeaseError::NoActiveLease(_) => {
                debug!(%err);
                Outcome::reply(NO_LEASE)
            }
            // malformed durations fall back to the default while parsing
            LeaseError::ServerOccupied(_) | LeaseError::MalformedDuration(_) => {
                warn!(%err, "unexpected failure handling command");
                Outcome::reply(INTERNAL_ERROR)
            }
        }
    }

    fn reclaim_query(&self, server: &ServerName) -> String {
        format!(
            "Someone needs a staging server. Are you done with {}? Reply 'y' or 'n'.",
            self.cfg.display_name(server)
        )
    }

    fn now_free(&self, lease: &Lease) -> String {
        format!("{} is now free!", self.cfg.display_name(lease.server()))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::{sync::mpsc::error::TryRecvError, time};
    use tracing_test::traced_test;

    use super::*;

    fn manager(servers: &[&str], default_hours: u32) -> (LeaseManager, ExpiryReceiver) {
        let cfg = StagingConfig::from_wire(config::wire::Config {
            servers: servers.iter().map(|s| s.to_string()).collect(),
            default_lease_hours: default_hours,
            max_lease_hours: None,
            domain_suffix: "staging".to_owned(),
        })
        .unwrap();
        LeaseManager::new(Arc::new(cfg))
    }

    fn caller(id: &str) -> CallerId {
        CallerId::from(id)
    }

    fn chan() -> ConversationId {
        ConversationId::from("C-general")
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn reclaim_round_trip() {
        let (mgr, _rx) = manager(&["release"], 4);

        let out = mgr.handle("allocate 1", &caller("A"), &chan());
        assert!(out.reply.contains("release"));
        assert!(out.reply.contains("1hrs"));
        assert!(matches!(out.events[..], [LeaseEvent::Allocated(_)]));
        assert!(logs_contain("lease allocated"));

        let out = mgr.handle("allocate", &caller("B"), &chan());
        assert!(out.reply.contains("occupied"));
        assert!(out.reply.contains("asking"));
        assert_eq!(out.notices.len(), 1);
        assert_eq!(out.notices[0].to, caller("A"));
        assert!(out.notices[0].text.contains("release.staging"));
        assert!(out.broadcast.is_none());
        assert!(mgr.registry().lease_of(&caller("B")).is_none());

        let out = mgr.handle("Y", &caller("A"), &ConversationId::from("D-A"));
        assert_eq!(
            out.broadcast,
            Some(Broadcast {
                conversation: chan(),
                text: "release.staging is now free!".to_owned(),
            })
        );
        assert!(matches!(out.events[..], [LeaseEvent::Reclaimed(_)]));
        assert!(mgr.registry().lease_of(&caller("A")).is_none());

        let out = mgr.handle("allocate", &caller("B"), &chan());
        assert_eq!(out.reply, "You have allocated release.staging for 4hrs");
    }

    #[tokio::test(start_paused = true)]
    async fn negative_reply_keeps_lease() {
        let (mgr, _rx) = manager(&["release"], 4);
        mgr.handle("allocate", &caller("A"), &chan());
        mgr.handle("allocate", &caller("B"), &chan());

        let out = mgr.handle("no", &caller("A"), &chan());
        assert_eq!(out.reply, "Okay, you can keep using release.staging");
        assert!(out.broadcast.is_none());
        assert!(out.events.is_empty());
        assert!(mgr.registry().lease_of(&caller("A")).is_some());

        // the query was answered, a late yes does nothing
        let out = mgr.handle("y", &caller("A"), &chan());
        assert_eq!(out.reply, NO_PENDING_QUERY);
        assert!(mgr.registry().lease_of(&caller("A")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn chatter_is_not_a_reply() {
        let (mgr, _rx) = manager(&["release"], 4);
        mgr.handle("allocate", &caller("A"), &chan());
        mgr.handle("allocate", &caller("B"), &chan());

        let out = mgr.handle("yikes, still using it", &caller("A"), &chan());
        assert!(out.reply.starts_with("Not sure what you mean by yikes"));
        assert!(out.broadcast.is_none());
        assert!(mgr.registry().lease_of(&caller("A")).is_some());
        assert!(mgr.reclaim().pending(&caller("A")).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_duration_uses_default() {
        let (mgr, _rx) = manager(&["release", "core"], 4);
        let out = mgr.handle("allocate abc", &caller("A"), &chan());
        assert_eq!(out.reply, "You have allocated release.staging for 4hrs");
        let lease = mgr.registry().lease_of(&caller("A")).unwrap();
        assert_eq!(lease.hours().get(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn free_without_lease() {
        let (mgr, _rx) = manager(&["release"], 4);
        let out = mgr.handle("free", &caller("A"), &chan());
        assert_eq!(out.reply, NO_LEASE);
        assert!(out.broadcast.is_none());
        assert!(out.events.is_empty());
        assert!(mgr.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn free_then_allocate_returns_same_server() {
        let (mgr, _rx) = manager(&["release"], 4);
        mgr.handle("allocate", &caller("A"), &chan());

        let out = mgr.handle("free", &caller("A"), &chan());
        assert_eq!(out.reply, "You have freed release.staging");
        assert_eq!(
            out.broadcast.map(|b| b.text),
            Some("release.staging is now free!".to_owned())
        );

        let out = mgr.handle("allocate 2", &caller("A"), &chan());
        assert_eq!(out.reply, "You have allocated release.staging for 2hrs");
    }

    #[tokio::test(start_paused = true)]
    async fn second_allocate_is_refused() {
        let (mgr, _rx) = manager(&["release", "core"], 4);
        mgr.handle("allocate", &caller("A"), &chan());

        let out = mgr.handle("allocate", &caller("A"), &chan());
        assert!(out.reply.starts_with("You already have release.staging until"));
        assert!(out.events.is_empty());
        assert_eq!(mgr.registry().len(), 1);
        assert!(!mgr.registry().is_leased(&"core".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn pool_full_while_holding_lease_is_refused_not_broadcast() {
        let (mgr, _rx) = manager(&["release"], 4);
        mgr.handle("allocate", &caller("A"), &chan());

        let out = mgr.handle("allocate", &caller("A"), &chan());
        assert!(out.notices.is_empty());
        assert_eq!(mgr.reclaim().pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_announced_once() {
        let (mgr, mut rx) = manager(&["release"], 4);
        mgr.handle("allocate 1", &caller("A"), &chan());
        mgr.handle("allocate", &caller("B"), &chan());

        time::sleep(Duration::from_secs(3601)).await;
        let ev = rx.recv().await.expect("expiry event");
        assert_eq!(mgr.reclaim().pending_count(), 1);
        let announcement = mgr.handle_expired(&ev);
        assert_eq!(mgr.reclaim().pending_count(), 0);
        assert_eq!(announcement.conversation, chan());
        assert_eq!(
            announcement.text,
            "release.staging lease for A has expired, release.staging is now free!"
        );

        // lease is gone, so neither free nor a late reply finds anything
        assert_eq!(mgr.handle("free", &caller("A"), &chan()).reply, NO_LEASE);
        assert_eq!(mgr.handle("y", &caller("A"), &chan()).reply, NO_PENDING_QUERY);
        time::sleep(Duration::from_secs(3600 * 8)).await;
        assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_command() {
        let (mgr, _rx) = manager(&["release"], 4);
        let out = mgr.handle("Deploy", &caller("A"), &chan());
        assert_eq!(
            out.reply,
            "Not sure what you mean by deploy. Try using 'allocate' and 'free' commands"
        );
        assert!(out.broadcast.is_none());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn server_occupied_is_generic_failure() {
        let (mgr, _rx) = manager(&["release"], 4);
        let out = mgr.error_outcome(LeaseError::ServerOccupied("release".into()));
        assert_eq!(out.reply, INTERNAL_ERROR);
        assert!(logs_contain("already leased"));
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_duration_is_never_shown() {
        let (mgr, _rx) = manager(&["release"], 4);
        let out = mgr.error_outcome(LeaseError::MalformedDuration("abc".to_owned()));
        assert_eq!(out.reply, INTERNAL_ERROR);
        assert!(!out.reply.contains("abc"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn huge_duration_is_capped() {
        let (mgr, _rx) = manager(&["release"], 4);

        let out = mgr.handle("allocate 3000000000", &caller("A"), &chan());
        assert_eq!(
            out.reply,
            format!(
                "You have allocated release.staging for {}hrs",
                config::LEASE_HOURS_CEILING
            )
        );
        assert!(logs_contain("lease allocated"));

        let out = mgr.handle("allocate", &caller("A"), &chan());
        assert!(out.reply.starts_with("You already have release.staging until"));
        assert!(out.reply.ends_with("Free it before allocating another server."));
        assert_eq!(
            mgr.registry().lease_of(&caller("A")).map(|l| l.hours().get()),
            Some(config::LEASE_HOURS_CEILING)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn reclaim_asks_all_occupants_first_yes_wins() {
        let (mgr, _rx) = manager(&["release", "core"], 4);
        mgr.handle("allocate", &caller("A"), &chan());
        mgr.handle("allocate", &caller("B"), &ConversationId::from("C-other"));

        let out = mgr.handle("allocate", &caller("C"), &chan());
        let asked: Vec<_> = out.notices.iter().map(|n| n.to.clone()).collect();
        assert_eq!(asked, vec![caller("A"), caller("B")]);

        let out = mgr.handle("yes", &caller("B"), &chan());
        assert_eq!(
            out.broadcast.map(|b| b.conversation),
            Some(ConversationId::from("C-other"))
        );
        let out = mgr.handle("allocate", &caller("C"), &chan());
        assert_eq!(out.reply, "You have allocated core.staging for 4hrs");
        // A's query is still open and can still be answered
        assert!(mgr.reclaim().pending(&caller("A")).is_some());
    }
}
