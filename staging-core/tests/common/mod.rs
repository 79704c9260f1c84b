use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};
use config::StagingConfig;
use staging_core::{
    Server,
    lease_manager::LeaseManager,
    tokio::{self, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    transport::{self, Outbound, TransportHandle},
};

/// a running server on an in-process transport
#[derive(Debug)]
pub(crate) struct ServerEnv {
    pub(crate) chat: TransportHandle,
    pub(crate) manager: Arc<LeaseManager>,
    pub(crate) token: CancellationToken,
    pub(crate) task: JoinHandle<Result<()>>,
}

impl ServerEnv {
    pub(crate) fn start(config: &str) -> Result<Self> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/test_configs")
            .join(config);
        let cfg = Arc::new(StagingConfig::parse(path)?);
        let (transport, chat) = transport::channel(16);
        let server = Server::new(cfg, transport);
        let manager = server.manager();
        let token = CancellationToken::new();
        let task = tokio::spawn(server.run(token.clone()));
        Ok(Self {
            chat,
            manager,
            token,
            task,
        })
    }

    pub(crate) async fn say(&self, caller: &str, conversation: &str, text: &str) -> Result<()> {
        self.chat.say(caller, conversation, text).await
    }

    pub(crate) async fn next(&mut self) -> Result<Outbound> {
        self.chat
            .outbound
            .recv()
            .await
            .context("server stopped sending")
    }

    /// the next message, which must be a private one to `to`
    pub(crate) async fn direct_to(&mut self, to: &str) -> Result<String> {
        match self.next().await? {
            Outbound::Direct { to: got, text } if got.as_str() == to => Ok(text),
            other => anyhow::bail!("expected direct message to {to}, got {other:?}"),
        }
    }

    /// the next message, which must be a broadcast on `conversation`
    pub(crate) async fn broadcast_on(&mut self, conversation: &str) -> Result<String> {
        match self.next().await? {
            Outbound::Broadcast {
                conversation: got,
                text,
            } if got.as_str() == conversation => Ok(text),
            other => anyhow::bail!("expected broadcast on {conversation}, got {other:?}"),
        }
    }

    pub(crate) async fn stop(self) -> Result<()> {
        self.token.cancel();
        self.task.await?
    }
}
