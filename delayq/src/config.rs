//! delayq configuration module
//!
//! Connection settings for the backing store and per-scheduler options.

use crate::{Error, Result};
use fred::types::{ReconnectPolicy, RedisConfig as FredRedisConfig, ServerConfig};
use std::time::Duration;

/// Reconnect delay increment per attempt, in milliseconds
const RECONNECT_STEP_MS: u32 = 50;

/// Upper bound for the reconnect delay, in milliseconds
const RECONNECT_CEILING_MS: u32 = 2000;

/// Default polling interval when no task is due
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(1);

/// Backing store connection configuration
///
/// Applied once per store client; every scheduler minted from the same
/// factory shares the connection it describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Redis host (default: localhost)
    pub host: String,

    /// Redis port (default: 6379)
    pub port: u16,

    /// Logical database index (default: 0)
    pub database: u8,

    /// Bounds the reconnect backoff to `max_retries * 50ms` (at most 2s).
    /// `0` uses the 2s ceiling. Reconnection itself never gives up.
    pub max_retries: u32,

    /// ACL username
    pub username: Option<String>,

    /// Password
    pub password: Option<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 6379,
            database: 0,
            max_retries: 0,
            username: None,
            password: None,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a Redis URL such as `redis://:password@host:port/db`
    ///
    /// Port and database are optional and fall back to the defaults. Only
    /// centralized deployments are supported.
    pub fn from_url(url: &str) -> Result<Self> {
        let parsed = FredRedisConfig::from_url(url)?;
        let server = match parsed.server {
            ServerConfig::Centralized { server } => server,
            _ => {
                return Err(Error::Config(format!(
                    "only centralized Redis URLs are supported: {}",
                    url
                )))
            }
        };

        let config = Self {
            host: server.host.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: server.port,
            database: parsed.database.unwrap_or(0),
            username: parsed.username,
            password: parsed.password,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Set the host
    #[must_use]
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the logical database index
    #[must_use]
    pub fn with_database(mut self, database: u8) -> Self {
        self.database = database;
        self
    }

    /// Set the reconnect backoff bound
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("host cannot be empty".into()));
        }
        if self.port == 0 {
            return Err(Error::Config("port must be greater than 0".into()));
        }
        Ok(())
    }

    /// Ceiling for the linear reconnect backoff
    pub fn reconnect_ceiling(&self) -> Duration {
        let ceiling = match self.max_retries {
            0 => RECONNECT_CEILING_MS,
            n => n.saturating_mul(RECONNECT_STEP_MS).min(RECONNECT_CEILING_MS),
        };
        Duration::from_millis(u64::from(ceiling))
    }

    /// Reconnect policy handed to the transport
    ///
    /// Attempts are unlimited; `max_retries` only shapes the delay.
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new_linear(
            0,
            self.reconnect_ceiling().as_millis() as u32,
            RECONNECT_STEP_MS,
        )
    }

    /// Client configuration handed to the transport
    ///
    /// The first connection goes through the reconnect policy too, so an
    /// unreachable server at startup is waited out rather than reported.
    pub fn to_fred_config(&self) -> FredRedisConfig {
        FredRedisConfig {
            server: ServerConfig::new_centralized(self.host.as_str(), self.port),
            database: Some(self.database),
            username: self.username.clone(),
            password: self.password.clone(),
            fail_fast: false,
            ..Default::default()
        }
    }

    /// Display form of the target, used in log lines
    pub fn url(&self) -> String {
        format!("redis://{}:{}/{}", self.host, self.port, self.database)
    }
}

/// Per-scheduler options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerOptions {
    /// Delay before re-querying the due index when nothing was due
    pub polling_interval: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            polling_interval: DEFAULT_POLLING_INTERVAL,
        }
    }
}

impl SchedulerOptions {
    /// Set the polling interval
    #[must_use]
    pub fn with_polling_interval(mut self, interval: Duration) -> Self {
        self.polling_interval = interval;
        self
    }

    /// Validate the options
    pub fn validate(&self) -> Result<()> {
        if self.polling_interval.is_zero() {
            return Err(Error::Config("polling_interval must be greater than 0".into()));
        }
        Ok(())
    }
}
