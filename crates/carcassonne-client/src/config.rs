//! Transport configuration.

use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_URL: &str = "ws://localhost:8080/ws";

/// Environment variables read by [`TransportConfig::from_env`]
pub const ENV_URL: &str = "CARCASSONNE_WS_URL";
pub const ENV_RECONNECT_INTERVAL: &str = "CARCASSONNE_RECONNECT_INTERVAL_MS";
pub const ENV_MAX_RECONNECT_ATTEMPTS: &str = "CARCASSONNE_MAX_RECONNECT_ATTEMPTS";
pub const ENV_HEARTBEAT_INTERVAL: &str = "CARCASSONNE_HEARTBEAT_INTERVAL_MS";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Connection settings supplied by the embedding application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    /// Server socket URL
    pub url: String,
    /// First reconnect delay; doubles with every attempt
    pub reconnect_interval: Duration,
    /// Reconnect attempts before giving up
    pub max_reconnect_attempts: u32,
    /// Time between PING messages while connected
    pub heartbeat_interval: Duration,
    /// Outbound messages kept while offline; the oldest is dropped beyond this
    pub max_queue_len: usize,
    /// Unparsed characters tolerated before the frame buffer is discarded
    pub max_buffer_len: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect_interval: Duration::from_millis(1000),
            max_reconnect_attempts: 3,
            heartbeat_interval: Duration::from_millis(30_000),
            max_queue_len: 256,
            max_buffer_len: 10_000,
        }
    }
}

impl TransportConfig {
    /// Defaults overridden by `CARCASSONNE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_URL) {
            config.url = url;
        }
        if let Some(ms) = parse_number(&lookup, ENV_RECONNECT_INTERVAL)? {
            config.reconnect_interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = parse_number(&lookup, ENV_MAX_RECONNECT_ATTEMPTS)? {
            config.max_reconnect_attempts =
                u32::try_from(attempts).unwrap_or(u32::MAX);
        }
        if let Some(ms) = parse_number(&lookup, ENV_HEARTBEAT_INTERVAL)? {
            config.heartbeat_interval = Duration::from_millis(ms);
        }

        Ok(config)
    }

    /// Delay before reconnect attempt number `attempts` (zero-based)
    pub fn reconnect_delay(&self, attempts: u32) -> Duration {
        let factor = 2u32.checked_pow(attempts).unwrap_or(u32::MAX);
        self.reconnect_interval.saturating_mul(factor)
    }
}

fn parse_number<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}
