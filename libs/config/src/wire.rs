//! serde representation of the config file, before validation
use serde::{Deserialize, Serialize};

/// top-level config type
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// catalog of servers, allocation prefers earlier entries
    pub servers: Vec<String>,
    #[serde(default = "default_lease_hours")]
    pub default_lease_hours: u32,
    #[serde(default)]
    pub max_lease_hours: Option<u32>,
    #[serde(default = "default_domain_suffix")]
    pub domain_suffix: String,
}

pub const fn default_lease_hours() -> u32 {
    4
}

pub fn default_domain_suffix() -> String {
    "staging".to_owned()
}
