//! # transport
//!
//! The boundary to the chat system. Whatever delivers messages to the bot
//! (and picks out the ones addressed to it) implements [`Transport`].
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use lease_manager::{Broadcast, CallerId, ConversationId, Notice};

/// a message addressed to the bot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    /// message text with the mention already stripped
    pub text: String,
    /// who sent it
    pub caller: CallerId,
    /// where it was sent
    pub conversation: ConversationId,
}

/// a message the bot wants delivered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outbound {
    /// private message to one user
    Direct {
        /// recipient
        to: CallerId,
        /// message body
        text: String,
    },
    /// message to everyone in a conversation
    Broadcast {
        /// target conversation
        conversation: ConversationId,
        /// message body
        text: String,
    },
}

impl From<Broadcast> for Outbound {
    fn from(b: Broadcast) -> Self {
        Outbound::Broadcast {
            conversation: b.conversation,
            text: b.text,
        }
    }
}

impl From<Notice> for Outbound {
    fn from(n: Notice) -> Self {
        Outbound::Direct {
            to: n.to,
            text: n.text,
        }
    }
}

/// source of commands and sink for responses
#[async_trait]
pub trait Transport: Send + 'static {
    /// next message for the bot, `None` once the inbound stream has ended
    ///
    /// CANCEL-SAFETY: `recv` is raced against expiry events and shutdown, it must
    /// not lose a message if the future is dropped before completing
    async fn recv(&mut self) -> Result<Option<Inbound>>;
    /// deliver one message
    async fn send(&mut self, msg: Outbound) -> Result<()>;
}

/// In-process [`Transport`] backed by mpsc channels
#[derive(Debug)]
pub struct ChannelTransport {
    inbound: mpsc::Receiver<Inbound>,
    outbound: mpsc::Sender<Outbound>,
}

/// the chat side of a [`ChannelTransport`]
#[derive(Debug)]
pub struct TransportHandle {
    /// messages for the bot
    pub inbound: mpsc::Sender<Inbound>,
    /// messages from the bot
    pub outbound: mpsc::Receiver<Outbound>,
}

/// create a connected [`ChannelTransport`] and [`TransportHandle`]
pub fn channel(size: usize) -> (ChannelTransport, TransportHandle) {
    let (in_tx, in_rx) = mpsc::channel(size);
    let (out_tx, out_rx) = mpsc::channel(size);
    (
        ChannelTransport {
            inbound: in_rx,
            outbound: out_tx,
        },
        TransportHandle {
            inbound: in_tx,
            outbound: out_rx,
        },
    )
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn recv(&mut self) -> Result<Option<Inbound>> {
        Ok(self.inbound.recv().await)
    }

    async fn send(&mut self, msg: Outbound) -> Result<()> {
        self.outbound
            .send(msg)
            .await
            .map_err(|err| anyhow!("outbound channel closed: {err}"))
    }
}

impl TransportHandle {
    /// send `text` as `caller` on `conversation`
    pub async fn say(&self, caller: &str, conversation: &str, text: &str) -> Result<()> {
        self.inbound
            .send(Inbound {
                text: text.to_owned(),
                caller: caller.into(),
                conversation: conversation.into(),
            })
            .await
            .map_err(|err| anyhow!("inbound channel closed: {err}"))
    }
}
