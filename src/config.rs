//! Configuration Module
//!
//! Handles loading and managing server configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::{DEFAULT_LOAD_FACTOR, DEFAULT_SPACE_LIMIT};
use crate::error::{CacheError, Result};

/// Server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Total weight the cache may hold before it starts evicting
    pub space_limit: usize,
    /// Fraction of the limit kept after an eviction sweep
    pub load_factor: f64,
    /// Number of independently locked cache shards
    pub shard_count: usize,
    /// HTTP server port
    pub server_port: u16,
    /// Background shrink task interval in seconds
    pub shrink_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SPACE_LIMIT` - Total cache weight (default: 100)
    /// - `LOAD_FACTOR` - Share of the limit kept after a sweep (default: 1/3)
    /// - `SHARD_COUNT` - Number of cache shards (default: 1)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `SHRINK_INTERVAL` - Overflow shrink frequency in seconds (default: 5)
    ///
    /// Unset variables take the default; a variable that is set but does not
    /// parse is an error rather than silently replaced.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            space_limit: env_or("SPACE_LIMIT", defaults.space_limit)?,
            load_factor: env_or("LOAD_FACTOR", defaults.load_factor)?,
            shard_count: env_or("SHARD_COUNT", defaults.shard_count)?,
            server_port: env_or("SERVER_PORT", defaults.server_port)?,
            shrink_interval: env_or("SHRINK_INTERVAL", defaults.shrink_interval)?,
        })
    }

    /// Rejects settings the cache cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.space_limit == 0 {
            return Err(CacheError::InvalidArgument(
                "SPACE_LIMIT must be at least 1".to_string(),
            ));
        }
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(CacheError::InvalidArgument(format!(
                "LOAD_FACTOR must be in (0, 1], got {}",
                self.load_factor
            )));
        }
        if self.shard_count == 0 {
            return Err(CacheError::InvalidArgument(
                "SHARD_COUNT must be at least 1".to_string(),
            ));
        }
        if self.shard_count > self.space_limit {
            return Err(CacheError::InvalidArgument(format!(
                "SHARD_COUNT ({}) must not exceed SPACE_LIMIT ({})",
                self.shard_count, self.space_limit
            )));
        }
        if self.shrink_interval == 0 {
            return Err(CacheError::InvalidArgument(
                "SHRINK_INTERVAL must be at least 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_or<T: FromStr>(name: &str, default: T) -> Result<T> {
    match env::var(name) {
        Ok(raw) => parse_var(name, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_var<T: FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse().map_err(|_| {
        CacheError::InvalidArgument(format!("{} has an unparseable value {:?}", name, raw))
    })
}

impl Default for Config {
    fn default() -> Self {
        Self {
            space_limit: DEFAULT_SPACE_LIMIT,
            load_factor: DEFAULT_LOAD_FACTOR,
            shard_count: 1,
            server_port: 3000,
            shrink_interval: 5,
        }
    }
}
