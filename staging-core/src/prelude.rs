//! staging-core prelude

pub use crate::{
    anyhow::{self, Context, Result},
    async_trait,
    lease_manager::{CallerId, ConversationId, LeaseManager, Outcome},
    server::Server,
    tokio,
    tracing::{self, debug, error, info, instrument, trace, warn},
    transport::{Inbound, Outbound, Transport},
};

pub use std::{io, sync::Arc};
