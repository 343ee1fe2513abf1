use std::time::Duration;

use query_engine_execution::pool::PoolOptions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ConfigurationError;

/// Settings for the PostgreSQL connection pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, clap::Args)]
#[serde(rename_all = "camelCase")]
pub struct PoolSettings {
    /// maximum number of pool connections
    #[serde(default = "max_connections_default")]
    #[arg(long = "pool-max-connections", env = "REPBATCH_DB_POOL_MAX_CONNECTIONS", default_value_t = max_connections_default())]
    pub max_connections: u32,
    /// connections kept open even when idle
    #[serde(default)]
    #[arg(long = "pool-min-connections", env = "REPBATCH_DB_POOL_MIN_CONNECTIONS", default_value_t = 0)]
    pub min_connections: u32,
    /// maximum lifetime for an individual connection (seconds)
    #[serde(default = "max_lifetime_default")]
    #[arg(long = "pool-max-lifetime", env = "REPBATCH_DB_POOL_MAX_LIFETIME", default_value = "3600")]
    pub max_lifetime: Option<u64>,
    /// idle timeout for releasing a connection from the pool (seconds)
    #[serde(default = "idle_timeout_default")]
    #[arg(long = "pool-idle-timeout", env = "REPBATCH_DB_POOL_IDLE_TIMEOUT", default_value = "1800")]
    pub idle_timeout: Option<u64>,
}

impl PoolSettings {
    pub fn is_default(&self) -> bool {
        *self == PoolSettings::default()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.max_connections == 0 {
            return Err(ConfigurationError::InvalidPoolSettings(
                "max connections must be at least 1",
            ));
        }
        if self.min_connections > self.max_connections {
            return Err(ConfigurationError::InvalidPoolSettings(
                "min connections cannot exceed max connections",
            ));
        }
        Ok(())
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            max_lifetime: self.max_lifetime.map(Duration::from_secs),
            idle_timeout: self.idle_timeout.map(Duration::from_secs),
        }
    }
}

impl Default for PoolSettings {
    fn default() -> PoolSettings {
        PoolSettings {
            max_connections: max_connections_default(),
            min_connections: 0,
            max_lifetime: max_lifetime_default(),
            idle_timeout: idle_timeout_default(),
        }
    }
}

// for serde default //
fn max_connections_default() -> u32 {
    10
}
#[allow(clippy::unnecessary_wraps)]
fn max_lifetime_default() -> Option<u64> {
    Some(60 * 60)
}
#[allow(clippy::unnecessary_wraps)]
fn idle_timeout_default() -> Option<u64> {
    Some(30 * 60)
}
