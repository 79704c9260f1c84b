//! What handling a command produced, for the transport to deliver.
use crate::{
    reclaim::PendingReclaimQuery,
    types::{CallerId, ConversationId, Lease},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    /// private response to whoever sent the command
    pub reply: String,
    /// message for everyone in a conversation
    pub broadcast: Option<Broadcast>,
    /// private messages to other users, ex. reclaim queries
    pub notices: Vec<Notice>,
    pub events: Vec<LeaseEvent>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub conversation: ConversationId,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub to: CallerId,
    pub text: String,
}

/// state changes caused by a command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaseEvent {
    Allocated(Lease),
    Freed(Lease),
    /// the occupant answered yes to a reclaim query
    Reclaimed(Lease),
    /// the pool was full, `queries` were sent out
    ReclaimRequested {
        requester: CallerId,
        queries: Vec<PendingReclaimQuery>,
    },
}

impl Outcome {
    pub fn reply<S: Into<String>>(reply: S) -> Self {
        Self {
            reply: reply.into(),
            broadcast: None,
            notices: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn broadcast<S: Into<String>>(mut self, conversation: ConversationId, text: S) -> Self {
        self.broadcast = Some(Broadcast {
            conversation,
            text: text.into(),
        });
        self
    }

    pub fn notices(mut self, notices: Vec<Notice>) -> Self {
        self.notices = notices;
        self
    }

    pub fn event(mut self, event: LeaseEvent) -> Self {
        self.events.push(event);
        self
    }
}
