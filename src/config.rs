//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::cache::{Population, QueryCacheConfig};

/// Entries expire one day after they are cached.
pub const DEFAULT_CACHE_TTL: u64 = 60 * 60 * 24;

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// TTL in seconds applied to every cached query result
    pub cache_ttl: u64,
    /// Upper bound in milliseconds for any single cache backend call
    pub cache_timeout_ms: u64,
    /// Whether cache population runs detached from the read
    pub populate: Population,
    /// HTTP server port
    pub server_port: u16,
    /// Background cleanup task interval in seconds
    pub cleanup_interval: u64,
    /// Redis connection URL, used only with the `redis` feature
    pub redis_url: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_TTL` - Cached result TTL in seconds (default: 86400)
    /// - `CACHE_TIMEOUT_MS` - Cache backend call timeout (default: 250)
    /// - `CACHE_POPULATE` - `detached` or `inline` (default: detached)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 1)
    /// - `REDIS_URL` - Redis connection URL (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            cache_ttl: parse_var("CACHE_TTL").unwrap_or(defaults.cache_ttl),
            cache_timeout_ms: parse_var("CACHE_TIMEOUT_MS").unwrap_or(defaults.cache_timeout_ms),
            populate: env::var("CACHE_POPULATE")
                .ok()
                .and_then(|v| Population::parse(&v))
                .unwrap_or(defaults.populate),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
            redis_url: env::var("REDIS_URL").ok().filter(|v| !v.is_empty()),
        }
    }

    /// Settings for the query cache derived from this configuration.
    pub fn query_cache(&self) -> QueryCacheConfig {
        QueryCacheConfig {
            ttl: Duration::from_secs(self.cache_ttl),
            timeout: Duration::from_millis(self.cache_timeout_ms),
            populate: self.populate,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl: DEFAULT_CACHE_TTL,
            cache_timeout_ms: 250,
            populate: Population::Detached,
            server_port: 3000,
            cleanup_interval: 1,
            redis_url: None,
        }
    }
}
