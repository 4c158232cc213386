//! Process configuration, read from the environment

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::controller::error::{Error, Result};
use crate::controller::retry::RetryPolicy;
use crate::suspension::{DEFAULT_PREFIX, Encoding};

pub const ENV_PREFIX: &str = "KEDA_SUSPENDER_PREFIX";
pub const ENV_ENCODING: &str = "KEDA_SUSPENDER_ENCODING";
pub const ENV_NAMESPACE: &str = "KEDA_SUSPENDER_NAMESPACE";
pub const ENV_INTERVAL_SECS: &str = "KEDA_SUSPENDER_INTERVAL_SECS";
pub const ENV_RETRY_STEPS: &str = "KEDA_SUSPENDER_RETRY_STEPS";
pub const ENV_CONCURRENCY: &str = "KEDA_SUSPENDER_CONCURRENCY";
pub const ENV_HEALTH_ADDR: &str = "KEDA_SUSPENDER_HEALTH_ADDR";

const DEFAULT_INTERVAL_SECS: u64 = 60;
const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Prefix scoping this operator's annotation keys
    pub prefix: String,
    /// Encoding used for new suspension state
    pub encoding: Encoding,
    /// Restrict the sweep to one namespace; all namespaces when `None`
    pub namespace: Option<String>,
    /// Time between sweeps
    pub interval: Duration,
    /// Conflict retry policy for each correction
    pub retry: RetryPolicy,
    /// Namespaces reconciled concurrently
    pub concurrency: usize,
    /// Bind address of the health/metrics server
    pub health_addr: SocketAddr,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            encoding: Encoding::default(),
            namespace: None,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS),
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
            health_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
        }
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`; unset or empty values fall back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let prefix = get(ENV_PREFIX).unwrap_or(defaults.prefix);
        let encoding = match get(ENV_ENCODING) {
            Some(v) => v.parse()?,
            None => defaults.encoding,
        };
        let interval_secs: u64 =
            parse_or(get(ENV_INTERVAL_SECS), ENV_INTERVAL_SECS, DEFAULT_INTERVAL_SECS)?;
        if interval_secs == 0 {
            return Err(Error::InvalidConfig(format!(
                "{ENV_INTERVAL_SECS} must be positive"
            )));
        }
        let steps: u32 = parse_or(get(ENV_RETRY_STEPS), ENV_RETRY_STEPS, defaults.retry.steps)?;
        let concurrency: usize =
            parse_or(get(ENV_CONCURRENCY), ENV_CONCURRENCY, DEFAULT_CONCURRENCY)?;
        let health_addr: SocketAddr =
            parse_or(get(ENV_HEALTH_ADDR), ENV_HEALTH_ADDR, defaults.health_addr)?;

        Ok(Self {
            prefix,
            encoding,
            namespace: get(ENV_NAMESPACE),
            interval: Duration::from_secs(interval_secs),
            retry: defaults.retry.with_steps(steps.max(1)),
            concurrency: concurrency.max(1),
            health_addr,
        })
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| Error::InvalidConfig(format!("{key}: invalid value '{v}'"))),
        None => Ok(default),
    }
}
