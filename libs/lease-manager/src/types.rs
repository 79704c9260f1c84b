use std::{
    fmt,
    num::NonZeroU32,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, SecondsFormat, Utc};
use config::ServerName;
use serde::{Deserialize, Serialize};

macro_rules! opaque_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new<S: Into<String>>(id: S) -> Self {
                Self(id.into())
            }
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self::new(id)
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

opaque_id!(
    /// identity of whoever sent a command, supplied by the transport
    CallerId
);
opaque_id!(
    /// the chat conversation a command arrived on
    ConversationId
);

/// Identity stamp of a single lease. Never reused, so a timer or a reclaim
/// query holding an old `LeaseId` can't act on a newer lease for the same
/// occupant or server.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LeaseId(pub(crate) u64);

impl fmt::Display for LeaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// an occupant's exclusive, time-bounded claim on one server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub(crate) id: LeaseId,
    pub(crate) occupant: CallerId,
    pub(crate) server: ServerName,
    pub(crate) conversation: ConversationId,
    pub(crate) hours: NonZeroU32,
    pub(crate) expires_at: SystemTime,
}

impl Lease {
    pub fn id(&self) -> LeaseId {
        self.id
    }
    pub fn occupant(&self) -> &CallerId {
        &self.occupant
    }
    pub fn server(&self) -> &ServerName {
        &self.server
    }
    /// where the lease was requested from, expiry is announced there
    pub fn conversation(&self) -> &ConversationId {
        &self.conversation
    }
    pub fn hours(&self) -> NonZeroU32 {
        self.hours
    }
    pub fn expires_at(&self) -> SystemTime {
        self.expires_at
    }
}

/// rfc3339 in UTC, or the raw `SystemTime` when chrono can't represent it
pub(crate) fn print_time(t: SystemTime) -> String {
    t.duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|since| i64::try_from(since.as_secs()).ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|| format!("{t:?}"))
}
