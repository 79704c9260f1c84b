//! # Server
//!
//! Reads commands from a [`Transport`], applies them with the
//! [`LeaseManager`], and delivers the results. Expiry events from the lease
//! timers are announced on the same transport.
use std::{fmt, sync::Arc};

use anyhow::{Context, Result};
use config::StagingConfig;
use lease_manager::{ExpiredEvent, ExpiryReceiver, LeaseManager, Outcome};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, trace};

use crate::{
    metrics,
    transport::{Inbound, Outbound, Transport},
};

/// Drives a [`LeaseManager`] from a [`Transport`]
pub struct Server<T> {
    manager: Arc<LeaseManager>,
    expired: ExpiryReceiver,
    transport: T,
}

impl<T> fmt::Debug for Server<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Server")
            .field("manager", &self.manager)
            .finish()
    }
}

impl<T> Server<T>
where
    T: Transport,
{
    /// Make a new server for the servers in `cfg`
    pub fn new(cfg: Arc<StagingConfig>, transport: T) -> Self {
        let (manager, expired) = LeaseManager::new(cfg);
        Self {
            manager: Arc::new(manager),
            expired,
            transport,
        }
    }

    /// shared handle to the lease state, ex. for inspection
    pub fn manager(&self) -> Arc<LeaseManager> {
        Arc::clone(&self.manager)
    }

    /// Run until `token` is cancelled or the inbound stream ends. Only an error
    /// reading from the transport stops the loop early; failed deliveries are logged.
    pub async fn run(mut self, token: CancellationToken) -> Result<()> {
        info!(
            servers = ?self.manager.config().catalog(),
            "serverbot ready"
        );
        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("shutdown requested, stopping server");
                    break;
                }
                msg = self.transport.recv() => {
                    match msg.context("failed to read from transport")? {
                        Some(msg) => self.dispatch(msg).await,
                        None => {
                            info!("inbound stream closed, stopping server");
                            break;
                        }
                    }
                }
                Some(ev) = self.expired.recv() => self.announce(ev).await,
            }
        }
        match metrics::encode() {
            Ok(text) => debug!(metrics = %text, "final metrics"),
            Err(err) => error!(?err, "failed to encode metrics"),
        }
        Ok(())
    }

    #[instrument(level = "debug", skip_all, fields(caller = %msg.caller))]
    async fn dispatch(&mut self, msg: Inbound) {
        let Inbound {
            text,
            caller,
            conversation,
        } = msg;
        trace!(?text, %conversation, "received command");
        // state changes are complete before anything is sent
        let Outcome {
            reply,
            broadcast,
            notices,
            events,
        } = self.manager.handle(&text, &caller, &conversation);
        for event in &events {
            debug!(?event, "lease event");
        }

        self.deliver(Outbound::Direct {
            to: caller,
            text: reply,
        })
        .await;
        for notice in notices {
            self.deliver(notice.into()).await;
        }
        if let Some(broadcast) = broadcast {
            self.deliver(broadcast.into()).await;
        }
    }

    async fn announce(&mut self, ev: ExpiredEvent) {
        debug!(occupant = %ev.occupant(), server = %ev.server(), "announcing expiry");
        let msg = self.manager.handle_expired(&ev).into();
        self.deliver(msg).await;
    }

    async fn deliver(&mut self, msg: Outbound) {
        trace!(?msg, "sending");
        if let Err(err) = self.transport.send(msg).await {
            error!(?err, "failed to deliver message");
        }
    }
}
