//! Stream server configuration.
//!
//! Provides keepalive timing for the hub and listener settings for the server.

use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Default interval between server pings in seconds.
pub const DEFAULT_PING_PERIOD_SECS: u64 = 45;

/// Default time a client has to answer a ping in seconds.
pub const DEFAULT_PONG_WAIT_SECS: u64 = 15;

/// Default upper bound for a single socket write in seconds.
pub const DEFAULT_WRITE_WAIT_SECS: u64 = 2;

/// Default listen host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default listen port.
pub const DEFAULT_PORT: u16 = 8080;

/// Keepalive configuration for the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubConfig {
    /// Interval between pings sent to each session.
    pub ping_period: Duration,

    /// Time a client has to acknowledge a ping.
    pub pong_wait: Duration,

    /// Upper bound for any single write to a session.
    pub write_wait: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            ping_period: Duration::from_secs(DEFAULT_PING_PERIOD_SECS),
            pong_wait: Duration::from_secs(DEFAULT_PONG_WAIT_SECS),
            write_wait: Duration::from_secs(DEFAULT_WRITE_WAIT_SECS),
        }
    }
}

impl HubConfig {
    /// Creates a configuration with the given ping period and pong wait.
    #[must_use]
    pub fn new(ping_period: Duration, pong_wait: Duration) -> Self {
        Self {
            ping_period,
            pong_wait,
            ..Default::default()
        }
    }

    /// Sets the write wait.
    #[must_use]
    pub fn with_write_wait(mut self, write_wait: Duration) -> Self {
        self.write_wait = write_wait;
        self
    }

    /// Time a session may go without a pong before it is considered dead.
    ///
    /// The first ping leaves after one `ping_period`, so the deadline covers a
    /// full period plus the pong wait.
    #[must_use]
    pub fn read_window(&self) -> Duration {
        self.ping_period + self.pong_wait
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any duration is zero or the pong wait is not shorter
    /// than the ping period.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_period.is_zero() {
            return Err(ConfigError::InvalidPingPeriod);
        }

        if self.pong_wait.is_zero() || self.pong_wait >= self.ping_period {
            return Err(ConfigError::InvalidPongWait);
        }

        if self.write_wait.is_zero() {
            return Err(ConfigError::InvalidWriteWait);
        }

        Ok(())
    }
}

/// Configuration for the HTTP server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Listen host.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Hub keepalive settings.
    pub hub: HubConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            hub: HubConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Creates a configuration for the given address with default hub settings.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            hub: HubConfig::default(),
        }
    }

    /// Sets the hub configuration.
    #[must_use]
    pub fn with_hub(mut self, hub: HubConfig) -> Self {
        self.hub = hub;
        self
    }

    /// Returns the `host:port` listen address.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Loads the configuration from `STREAM_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable cannot be parsed or the resulting hub
    /// configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        let hub = HubConfig {
            ping_period: Duration::from_secs(env_or(
                "STREAM_PING_PERIOD_SECS",
                DEFAULT_PING_PERIOD_SECS,
            )?),
            pong_wait: Duration::from_secs(env_or("STREAM_PONG_WAIT_SECS", DEFAULT_PONG_WAIT_SECS)?),
            write_wait: Duration::from_secs(env_or(
                "STREAM_WRITE_WAIT_SECS",
                DEFAULT_WRITE_WAIT_SECS,
            )?),
        };
        hub.validate()?;

        Ok(Self {
            host: env::var("STREAM_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string()),
            port: env_or("STREAM_PORT", DEFAULT_PORT)?,
            hub,
        })
    }
}

fn env_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value }),
        Err(_) => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid ping period.
    #[error("ping_period must be > 0")]
    InvalidPingPeriod,

    /// Invalid pong wait.
    #[error("pong_wait must be > 0 and shorter than ping_period")]
    InvalidPongWait,

    /// Invalid write wait.
    #[error("write_wait must be > 0")]
    InvalidWriteWait,

    /// An environment variable held an unparsable value.
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = HubConfig::default();
        assert_eq!(config.ping_period, Duration::from_secs(45));
        assert_eq!(config.pong_wait, Duration::from_secs(15));
        assert_eq!(config.write_wait, Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = HubConfig::new(Duration::from_secs(4), Duration::from_secs(1))
            .with_write_wait(Duration::from_millis(500));

        assert_eq!(config.ping_period, Duration::from_secs(4));
        assert_eq!(config.pong_wait, Duration::from_secs(1));
        assert_eq!(config.write_wait, Duration::from_millis(500));
        assert_eq!(config.read_window(), Duration::from_secs(5));
    }

    #[test]
    fn test_config_validate_zero_ping_period() {
        let config = HubConfig::new(Duration::ZERO, Duration::from_secs(1));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidPingPeriod)
        ));
    }

    #[test]
    fn test_config_validate_pong_wait_too_long() {
        let config = HubConfig::new(Duration::from_secs(4), Duration::from_secs(4));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidPongWait)));
    }

    #[test]
    fn test_config_validate_zero_write_wait() {
        let config = HubConfig::default().with_write_wait(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWriteWait)));
    }

    #[test]
    fn test_server_config_bind_address() {
        let config = ServerConfig::new("127.0.0.1", 9000);
        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(config.hub, HubConfig::default());
    }

    #[test]
    fn test_env_or_missing_uses_default() {
        let value: u64 = env_or("HERALD_TEST_SURELY_UNSET_VARIABLE", 7).expect("default");
        assert_eq!(value, 7);
    }

    #[test]
    fn test_env_or_unparsable_value() {
        env::set_var("HERALD_TEST_UNPARSABLE_PORT", "eighty");

        let result: Result<u16, _> = env_or("HERALD_TEST_UNPARSABLE_PORT", 8080);

        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key: "HERALD_TEST_UNPARSABLE_PORT", ref value })
                if value == "eighty"
        ));
        env::remove_var("HERALD_TEST_UNPARSABLE_PORT");
    }

    // The only test touching STREAM_* variables, so nothing races on them.
    #[test]
    fn test_server_config_from_env() {
        env::set_var("STREAM_HOST", "127.0.0.1");
        env::set_var("STREAM_PORT", " 9001 ");
        env::set_var("STREAM_PING_PERIOD_SECS", "4");
        env::set_var("STREAM_PONG_WAIT_SECS", "1");
        env::set_var("STREAM_WRITE_WAIT_SECS", "3");

        let config = ServerConfig::from_env().expect("valid environment");
        assert_eq!(config.bind_address(), "127.0.0.1:9001");
        assert_eq!(
            config.hub,
            HubConfig::new(Duration::from_secs(4), Duration::from_secs(1))
                .with_write_wait(Duration::from_secs(3))
        );

        env::set_var("STREAM_PONG_WAIT_SECS", "soon");
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::InvalidValue { key: "STREAM_PONG_WAIT_SECS", .. })
        ));

        env::set_var("STREAM_PONG_WAIT_SECS", "4");
        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::InvalidPongWait)
        ));

        for key in [
            "STREAM_HOST",
            "STREAM_PORT",
            "STREAM_PING_PERIOD_SECS",
            "STREAM_PONG_WAIT_SECS",
            "STREAM_WRITE_WAIT_SECS",
        ] {
            env::remove_var(key);
        }
    }
}
