//! Failure cases of lease operations.
//!
//! None of these escape [`LeaseManager::handle`]; each one is rendered as a
//! chat response for the caller.
//!
//! [`LeaseManager::handle`]: crate::LeaseManager::handle
use config::ServerName;
use thiserror::Error;

use crate::types::{CallerId, Lease};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LeaseError {
    /// occupant tried to allocate while holding a lease
    #[error("{} already holds {} ({})", .0.occupant(), .0.server(), .0.id())]
    AlreadyLeased(Box<Lease>),
    /// the chosen server is leased by someone else. Only reachable if the
    /// pool lookup and the allocation race
    #[error("server {0} is already leased")]
    ServerOccupied(ServerName),
    /// free or reply with nothing to act on
    #[error("{0} has no active lease")]
    NoActiveLease(CallerId),
    /// hours argument that isn't a positive integer
    #[error("malformed lease duration {0:?}")]
    MalformedDuration(String),
}

impl LeaseError {
    /// true if hitting this error points at a bug rather than user input
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, LeaseError::ServerOccupied(_))
    }
}

pub type LeaseResult<T> = Result<T, LeaseError>;
