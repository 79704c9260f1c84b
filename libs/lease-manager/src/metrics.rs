//! Lease lifecycle metrics.
//!
//! Metrics are lazily initialized on first access via `lazy_static!` and
//! registered with the prometheus default registry.

use lazy_static::lazy_static;
use prometheus::{IntCounter, IntGauge, register_int_counter, register_int_gauge};

lazy_static! {
    /// Count of leases handed out
    pub static ref LEASES_ALLOCATED: IntCounter = register_int_counter!(
        "leases_allocated",
        "count of leases allocated"
    ).unwrap();

    /// Count of leases ended with an explicit `free`
    pub static ref LEASES_FREED: IntCounter = register_int_counter!(
        "leases_freed",
        "count of leases freed by their occupant"
    ).unwrap();

    /// Count of leases ended by their expiry timer
    pub static ref LEASES_EXPIRED: IntCounter = register_int_counter!(
        "leases_expired",
        "count of leases that reached their expiry time"
    ).unwrap();

    /// Count of leases given up in answer to a reclaim query
    pub static ref LEASES_RECLAIMED: IntCounter = register_int_counter!(
        "leases_reclaimed",
        "count of leases released after a reclaim query"
    ).unwrap();

    /// Count of individual reclaim queries sent to occupants
    pub static ref RECLAIM_QUERIES_SENT: IntCounter = register_int_counter!(
        "reclaim_queries_sent",
        "count of reclaim queries sent to occupants"
    ).unwrap();

    /// Count of allocations that found every server leased
    pub static ref POOL_EXHAUSTED: IntCounter = register_int_counter!(
        "pool_exhausted",
        "count of allocate commands that found no vacant server"
    ).unwrap();

    /// Count of commands that could not be parsed
    pub static ref UNRECOGNIZED_COMMANDS: IntCounter = register_int_counter!(
        "unrecognized_commands",
        "count of commands that were not understood"
    ).unwrap();

    /// Gauge: leases currently live
    pub static ref LEASES_ACTIVE: IntGauge = register_int_gauge!(
        "leases_active",
        "number of leases currently held"
    ).unwrap();
}
