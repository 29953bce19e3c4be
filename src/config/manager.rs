//! Configuration Manager

use super::{RelayConfig, Target};
use crate::error::StartupError;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the default log level
pub const ENV_LOG_LEVEL: &str = "REVPIPE_LOG_LEVEL";
/// Environment variable holding the default connect timeout
pub const ENV_CONNECT_TIMEOUT: &str = "REVPIPE_CONNECT_TIMEOUT";

/// Startup parameters as handed over by the argument parser, unvalidated
#[derive(Debug, Clone, Default)]
pub struct RawArgs {
    pub host1: String,
    pub port1: String,
    pub host2: String,
    pub port2: String,
    pub log_level: Option<String>,
    pub verbose: bool,
    pub connect_timeout: Option<String>,
    pub stats_json: bool,
}

/// Builds and validates the relay configuration
pub struct ConfigManager;

impl ConfigManager {
    /// Build configuration from arguments, falling back to the process environment
    pub fn from_args(raw: RawArgs) -> Result<RelayConfig, StartupError> {
        Self::from_args_with_env(raw, |key| std::env::var(key).ok())
    }

    /// Build configuration from arguments with an explicit environment lookup
    ///
    /// Arguments take priority over the environment. Both targets are
    /// validated before anything else so that a bad port never leads to a
    /// connection attempt.
    pub fn from_args_with_env<F>(raw: RawArgs, env: F) -> Result<RelayConfig, StartupError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let first = Self::build_target(&raw.host1, &raw.port1)?;
        let second = Self::build_target(&raw.host2, &raw.port2)?;

        let mut config = RelayConfig::new(first, second);

        let level = if raw.verbose {
            Some(("--verbose", "debug".to_string()))
        } else {
            match raw.log_level {
                Some(value) => Some(("--log-level", value)),
                None => env(ENV_LOG_LEVEL).map(|value| (ENV_LOG_LEVEL, value)),
            }
        };
        if let Some((option, value)) = level {
            config.log_level = parse_log_level(option, value)?;
        }

        let timeout = match raw.connect_timeout {
            Some(value) => Some(("--connect-timeout", value)),
            None => env(ENV_CONNECT_TIMEOUT).map(|value| (ENV_CONNECT_TIMEOUT, value)),
        };
        if let Some((option, value)) = timeout {
            config.connect_timeout = Some(parse_timeout(option, &value)?);
        }

        config.stats_json = raw.stats_json;

        Ok(config)
    }

    fn build_target(host: &str, port: &str) -> Result<Target, StartupError> {
        if host.is_empty() {
            return Err(StartupError::Usage("target host must not be empty".to_string()));
        }
        let port = parse_port(port)?;
        Ok(Target::new(host, port))
    }
}

/// Parse a target port, rejecting anything outside 1..=65535
///
/// A port of zero is refused outright since it is indistinguishable from a
/// failed numeric conversion.
pub fn parse_port(value: &str) -> Result<u16, StartupError> {
    match value.trim().parse::<u16>() {
        Ok(0) | Err(_) => Err(StartupError::InvalidPort(value.to_string())),
        Ok(port) => Ok(port),
    }
}

fn parse_log_level(option: &str, value: String) -> Result<String, StartupError> {
    match EnvFilter::try_new(&value) {
        Ok(_) => Ok(value),
        Err(e) => Err(StartupError::InvalidOption {
            option: option.to_string(),
            reason: format!("'{}': {}", value, e),
        }),
    }
}

fn parse_timeout(option: &str, value: &str) -> Result<Duration, StartupError> {
    let duration = humantime::parse_duration(value).map_err(|e| StartupError::InvalidOption {
        option: option.to_string(),
        reason: format!("'{}': {}", value, e),
    })?;

    if duration.is_zero() {
        return Err(StartupError::InvalidOption {
            option: option.to_string(),
            reason: "connect timeout must be greater than 0".to_string(),
        });
    }

    Ok(duration)
}
