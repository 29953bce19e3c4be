//! Configuration Types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One of the two fixed remote endpoints the relay connects to
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Target {
    /// Literal IP address or resolvable host name
    pub host: String,
    /// Always in 1..=65535 once built through `ConfigManager`
    pub port: u16,
}

impl Target {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Everything a single relay run needs
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RelayConfig {
    /// Connected first, serviced first
    pub first: Target,
    pub second: Target,
    /// Upper bound on each connect attempt; `None` leaves it to the OS
    #[serde(default)]
    pub connect_timeout: Option<Duration>,
    pub log_level: String,
    /// Print final session statistics as JSON on stdout
    #[serde(default)]
    pub stats_json: bool,
}

impl RelayConfig {
    pub fn new(first: Target, second: Target) -> Self {
        Self {
            first,
            second,
            connect_timeout: None,
            log_level: "info".to_string(),
            stats_json: false,
        }
    }
}
