use std::env;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::error::{OnionooError, Result};

pub const DEFAULT_BASE_URL: &str = "https://onionoo.torproject.org";
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Client configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Scheme and host the endpoint paths are appended to.
    pub base_url: String,
    /// Attempts per request before giving up on timeouts.
    pub max_retries: u32,
    /// Bound on each individual attempt.
    pub timeout: Duration,
    /// Toggles the response cache.
    pub enable_cache: bool,
    /// How long a cached response stays fresh.
    pub cache_ttl: Duration,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            enable_cache: false,
            cache_ttl: DEFAULT_CACHE_TTL,
            user_agent: format!("onionoo-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Creates ClientConfig from environment variables with defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Same as [`ClientConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            base_url: lookup("ONIONOO_BASE_URL").unwrap_or(defaults.base_url),
            max_retries: parse_or(&lookup, "ONIONOO_MAX_RETRIES", defaults.max_retries),
            timeout: Duration::from_secs(parse_or(
                &lookup,
                "ONIONOO_TIMEOUT_SECS",
                defaults.timeout.as_secs(),
            )),
            enable_cache: parse_or(&lookup, "ONIONOO_ENABLE_CACHE", defaults.enable_cache),
            cache_ttl: Duration::from_secs(parse_or(
                &lookup,
                "ONIONOO_CACHE_TTL_SECS",
                defaults.cache_ttl.as_secs(),
            )),
            user_agent: defaults.user_agent,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(OnionooError::Config("max_retries must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(OnionooError::Config("timeout must be non-zero".into()));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(OnionooError::Config(format!(
                "base url {:?} has no http(s) scheme",
                self.base_url
            )));
        }
        Ok(())
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(name) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|e| {
            warn!("ignoring {name}={raw:?} ({e}), using default {default}");
            default
        }),
    }
}
