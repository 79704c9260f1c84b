//! # staging-core
//!
//! Runtime glue for the staging server bot: configuration, logging, the
//! transport boundary and the server loop around [`LeaseManager`].
//!
//! [`LeaseManager`]: lease_manager::LeaseManager
#![warn(
    missing_debug_implementations,
    missing_docs,
    rust_2018_idioms,
    unreachable_pub,
    non_snake_case,
    non_upper_case_globals
)]
#![allow(clippy::cognitive_complexity)]
#![deny(rustdoc::broken_intra_doc_links)]
pub use anyhow;
pub use async_trait::async_trait;
pub use lease_manager;
pub use tokio;
pub use tokio_util;
pub use tracing;

pub use crate::server::Server;

pub mod config;
pub mod metrics;
pub mod prelude;
pub mod server;
pub mod transport;
