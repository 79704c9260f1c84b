#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![deny(rustdoc::broken_intra_doc_links)]
#![allow(clippy::cognitive_complexity)]

//! # lease-manager
//!
//! Hands out servers from a fixed catalog to chat users for a bounded number
//! of hours.
//!
//! [`LeaseManager`] is the entry point: it takes the text of a command plus
//! who sent it and where, applies it to the [`LeaseRegistry`], and returns an
//! [`Outcome`] describing what to send back. When every server is taken the
//! [`ReclaimCoordinator`] asks the current occupants whether they are done.
//!
//! Leases expire on their own. Expiry runs on a timer task per lease and is
//! reported through the [`ExpiryReceiver`] returned by [`LeaseManager::new`],
//! the transport is responsible for announcing it.
//!
//! [`LeaseManager`]: crate::LeaseManager
//! [`LeaseRegistry`]: crate::LeaseRegistry
//! [`ReclaimCoordinator`]: crate::ReclaimCoordinator
//! [`Outcome`]: crate::Outcome
//! [`ExpiryReceiver`]: crate::ExpiryReceiver
pub mod command;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod outcome;
pub mod pool;
pub mod reclaim;
pub mod registry;
pub mod types;

pub use config::ServerName;

pub use crate::{
    command::Command,
    error::{LeaseError, LeaseResult},
    manager::LeaseManager,
    outcome::{Broadcast, LeaseEvent, Notice, Outcome},
    pool::ServerPool,
    reclaim::{PendingReclaimQuery, ReclaimCoordinator, ReplyOutcome},
    registry::{ExpiredEvent, ExpiryReceiver, LeaseRegistry},
    types::{CallerId, ConversationId, Lease, LeaseId},
};
