//! # metrics
//!
//! the lease counters live in `lease_manager::metrics`, this renders whatever
//! is registered in the default registry
use anyhow::Result;
use prometheus::{Encoder, TextEncoder};

/// default registry in the prometheus text format
pub fn encode() -> Result<String> {
    let mut buf = Vec::new();
    TextEncoder::new().encode(&prometheus::gather(), &mut buf)?;
    Ok(String::from_utf8(buf)?)
}
