//! typed reads of environment variables with a fallback value
use anyhow::Context;

use std::{env, str::FromStr};

/// Read `name` from the environment and parse it as `T`. An unset (or non
/// unicode) variable parses `default` instead.
pub fn parse_var<T, S>(name: &str, default: S) -> Result<T, <T as FromStr>::Err>
where
    T: FromStr,
    S: ToString,
{
    match env::var(name) {
        Ok(val) => val.parse(),
        Err(_) => default.to_string().parse(),
    }
}

/// [`parse_var`] with an error that names the variable
pub fn parse_var_with_err<T, S>(name: &str, default: S) -> anyhow::Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::error::Error + Send + Sync + 'static,
    S: ToString,
{
    parse_var(name, default).with_context(|| format!("error parsing env var {name}"))
}
