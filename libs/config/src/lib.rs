use std::{
    collections::HashSet,
    fmt,
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub mod wire;

/// upper bound on any lease, in hours (one year)
pub const LEASE_HOURS_CEILING: u32 = 24 * 365;

/// Name of one server in the catalog, ex. `release`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerName(String);

impl ServerName {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self(name.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// server config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingConfig {
    catalog: Vec<ServerName>,
    lease: LeaseTime,
    domain_suffix: String,
    path: Option<PathBuf>,
}

impl StagingConfig {
    /// decodes the config as JSON or YAML depending on the file extension. With no
    /// known extension JSON is attempted first, then YAML
    pub fn parse<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("failed to find config at {}", &path.display()))?;
        let wire = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&input)?,
            Some("yaml" | "yml") => serde_yaml::from_str(&input)?,
            _ => decode(&input)?,
        };
        let mut config = Self::from_wire(wire)?;
        config.path = Some(path.to_path_buf());
        debug!(?config);
        Ok(config)
    }

    /// attempts to decode the config first as JSON, then YAML, finally erroring if neither work
    pub fn parse_str<S: AsRef<str>>(s: S) -> Result<Self> {
        let config = Self::from_wire(decode(s.as_ref())?)?;
        debug!(?config);
        Ok(config)
    }

    /// validate the wire format
    pub fn from_wire(cfg: wire::Config) -> Result<Self> {
        if cfg.servers.is_empty() {
            bail!("server catalog must contain at least one server");
        }
        let mut seen = HashSet::new();
        for name in &cfg.servers {
            if name.trim().is_empty() {
                bail!("server names must not be blank");
            }
            if !seen.insert(name.as_str()) {
                bail!("server {name} is listed more than once");
            }
        }
        let default = NonZeroU32::new(cfg.default_lease_hours)
            .context("default_lease_hours must be greater than 0")?;
        if default.get() > LEASE_HOURS_CEILING {
            bail!("default_lease_hours {default} is above the limit of {LEASE_HOURS_CEILING}");
        }
        let max = cfg
            .max_lease_hours
            .map(|max| {
                NonZeroU32::new(max)
                    .filter(|max| *max >= default && max.get() <= LEASE_HOURS_CEILING)
                    .with_context(|| {
                        format!(
                            "max_lease_hours {max} must be between default_lease_hours \
                             {default} and {LEASE_HOURS_CEILING}"
                        )
                    })
            })
            .transpose()?;

        Ok(Self {
            catalog: cfg.servers.into_iter().map(ServerName).collect(),
            lease: LeaseTime::new(default, max),
            domain_suffix: cfg.domain_suffix,
            path: None,
        })
    }

    /// the fixed, ordered list of servers
    pub fn catalog(&self) -> &[ServerName] {
        &self.catalog
    }
    pub fn lease_time(&self) -> LeaseTime {
        self.lease
    }
    pub fn default_lease_hours(&self) -> NonZeroU32 {
        self.lease.default
    }
    /// calculate the lease hours based on a possible requested amount
    pub fn lease_hours(&self, requested: Option<NonZeroU32>) -> NonZeroU32 {
        self.lease.determine_hours(requested)
    }
    /// name as shown in chat, ex. `release.staging`
    pub fn display_name(&self, server: &ServerName) -> String {
        if self.domain_suffix.is_empty() {
            server.to_string()
        } else {
            format!("{server}.{}", self.domain_suffix)
        }
    }
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

fn decode(input: &str) -> Result<wire::Config> {
    match serde_json::from_str(input) {
        Ok(cfg) => Ok(cfg),
        Err(json_err) => {
            debug!(?json_err, "config is not JSON, trying YAML");
            serde_yaml::from_str(input).context("config is neither valid JSON nor YAML")
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LeaseTime {
    default: NonZeroU32,
    max: Option<NonZeroU32>,
}

impl LeaseTime {
    pub fn new(default: NonZeroU32, max: Option<NonZeroU32>) -> Self {
        Self { default, max }
    }
    pub fn get_default(&self) -> NonZeroU32 {
        self.default
    }
    pub fn get_max(&self) -> Option<NonZeroU32> {
        self.max
    }
    /// requested hours are capped at `max`, or at [`LEASE_HOURS_CEILING`] when
    /// there is no `max`. No request means `default`
    pub fn determine_hours(&self, requested: Option<NonZeroU32>) -> NonZeroU32 {
        match requested {
            Some(req) => req.min(self.max.unwrap_or(ceiling())),
            None => self.default,
        }
    }
}

fn ceiling() -> NonZeroU32 {
    NonZeroU32::new(LEASE_HOURS_CEILING).unwrap_or(NonZeroU32::MAX)
}

/// convert whole hours into a `Duration`
pub fn hours(h: NonZeroU32) -> Duration {
    Duration::from_secs(u64::from(h.get()) * 60 * 60)
}
