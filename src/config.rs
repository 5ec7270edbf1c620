//! Lifecycle configuration module
//! Loads poller, watcher, anchor and logging settings from the environment and validates them

use std::env;
use std::time::Duration;

use crate::workers::terminal_poller::PollOptions;

/// Main configuration
#[derive(Debug, Clone)]
pub struct LifecycleConfig {
    pub poller: PollerConfig,
    pub watcher: WatcherConfig,
    pub anchor: AnchorConfig,
    pub logging: LoggingConfig,
}

/// Terminal-state poller configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
    pub max_consecutive_failures: u32,
    pub max_backoff_ms: u64,
}

/// Multi-transaction watcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatcherConfig {
    pub interval_ms: u64,
}

/// Anchor / wallet backend endpoint configuration
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    pub base_url: String,
    pub request_timeout: Duration,
    pub auth_token: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Plain,
}

impl LifecycleConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if it exists
        let _ = dotenv::dotenv().ok();

        Ok(LifecycleConfig {
            poller: PollerConfig::from_env()?,
            watcher: WatcherConfig::from_env()?,
            anchor: AnchorConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.poller.validate()?;
        self.watcher.validate()?;
        self.anchor.validate()?;

        Ok(())
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        let defaults = PollOptions::default();
        Self {
            interval_ms: defaults.interval.as_millis() as u64,
            max_attempts: defaults.max_attempts,
            max_consecutive_failures: defaults.max_consecutive_failures,
            max_backoff_ms: defaults.max_backoff.as_millis() as u64,
        }
    }
}

impl PollerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(PollerConfig {
            interval_ms: parse_var("TX_POLL_INTERVAL_MS", defaults.interval_ms)?,
            max_attempts: parse_var("TX_POLL_MAX_ATTEMPTS", defaults.max_attempts)?,
            max_consecutive_failures: parse_var(
                "TX_POLL_MAX_CONSECUTIVE_FAILURES",
                defaults.max_consecutive_failures,
            )?,
            max_backoff_ms: parse_var("TX_POLL_MAX_BACKOFF_MS", defaults.max_backoff_ms)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "TX_POLL_INTERVAL_MS cannot be 0".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "TX_POLL_MAX_ATTEMPTS cannot be 0".to_string(),
            ));
        }

        if self.max_backoff_ms < self.interval_ms {
            return Err(ConfigError::ValidationFailed(
                "TX_POLL_MAX_BACKOFF_MS must be at least TX_POLL_INTERVAL_MS".to_string(),
            ));
        }

        Ok(())
    }

    pub fn poll_options(&self) -> PollOptions {
        PollOptions::new(Duration::from_millis(self.interval_ms), self.max_attempts)
            .with_max_consecutive_failures(self.max_consecutive_failures)
            .with_max_backoff(Duration::from_millis(self.max_backoff_ms))
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self { interval_ms: 5000 }
    }
}

impl WatcherConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(WatcherConfig {
            interval_ms: parse_var("TX_WATCH_INTERVAL_MS", Self::default().interval_ms)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "TX_WATCH_INTERVAL_MS cannot be 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl AnchorConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: Duration::from_secs(15),
            auth_token: None,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = env::var("ANCHOR_BASE_URL")
            .map_err(|_| ConfigError::MissingVariable("ANCHOR_BASE_URL".to_string()))?;

        Ok(AnchorConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(parse_var("ANCHOR_REQUEST_TIMEOUT_SECS", 15u64)?),
            auth_token: env::var("ANCHOR_AUTH_TOKEN").ok().filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::InvalidValue("ANCHOR_BASE_URL".to_string()));
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue(
                "ANCHOR_BASE_URL must be a valid URL".to_string(),
            ));
        }

        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "ANCHOR_REQUEST_TIMEOUT_SECS".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Plain,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let format = match env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "plain".to_string())
            .to_lowercase()
            .as_str()
        {
            "json" => LogFormat::Json,
            "plain" | "pretty" | "text" => LogFormat::Plain,
            _ => return Err(ConfigError::InvalidValue("LOG_FORMAT".to_string())),
        };

        Ok(LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format,
        })
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue(name.to_string())),
        Err(_) => Ok(default),
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),

    #[error("Invalid value for configuration: {0}")]
    InvalidValue(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poller_defaults_are_valid() {
        let config = PollerConfig::default();
        assert!(config.validate().is_ok());

        let options = config.poll_options();
        assert_eq!(options, PollOptions::default());
    }

    #[test]
    fn test_zero_poll_interval_validation() {
        let config = PollerConfig {
            interval_ms: 0,
            ..PollerConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_attempts_validation() {
        let config = PollerConfig {
            max_attempts: 0,
            ..PollerConfig::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_backoff_below_interval_validation() {
        let config = PollerConfig {
            interval_ms: 5000,
            max_backoff_ms: 1000,
            ..PollerConfig::default()
        };

        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_anchor_url_validation() {
        assert!(AnchorConfig::new("https://anchor.example.com").validate().is_ok());
        assert!(AnchorConfig::new("anchor.example.com").validate().is_err());
        assert!(AnchorConfig::new("").validate().is_err());

        let mut config = AnchorConfig::new("http://127.0.0.1:8000");
        config.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_watcher_interval_validation() {
        assert!(WatcherConfig::default().validate().is_ok());
        assert_eq!(WatcherConfig::default().interval(), Duration::from_secs(5));
        assert!(WatcherConfig { interval_ms: 0 }.validate().is_err());
    }
}
