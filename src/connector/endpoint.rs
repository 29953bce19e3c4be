//! Outbound connection establishment

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::config::{RelayConfig, Target};
use crate::error::StartupError;
use crate::relay::Connection;

/// Resolves targets and opens one TCP connection per target
#[derive(Debug, Clone, Default)]
pub struct EndpointConnector {
    connect_timeout: Option<Duration>,
}

impl EndpointConnector {
    /// Create a connector that leaves connect timing to the OS
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a connector that gives up on a connect after `connect_timeout`
    pub fn with_timeout(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout: Some(connect_timeout),
        }
    }

    /// Create a connector from configuration
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
        }
    }

    /// Resolve a target to the single address it will be connected on
    ///
    /// Literal addresses are used as-is. Names go through the system
    /// resolver and the first returned address wins.
    pub async fn resolve(&self, target: &Target) -> Result<SocketAddr, StartupError> {
        let literal = target.host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = literal.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, target.port));
        }

        debug!("Resolving host: {}", target);
        let mut addrs = lookup_host((target.host.as_str(), target.port))
            .await
            .map_err(|e| {
                error!("DNS resolution failed for {}: {}", target.host, e);
                StartupError::Resolution {
                    host: target.host.clone(),
                    reason: e.to_string(),
                }
            })?;

        match addrs.next() {
            Some(addr) => {
                debug!("Resolved {} to {}", target.host, addr);
                Ok(addr)
            }
            None => Err(StartupError::Resolution {
                host: target.host.clone(),
                reason: "no addresses returned".to_string(),
            }),
        }
    }

    /// Resolve and connect to a single target, in one attempt
    pub async fn connect(
        &self,
        label: &'static str,
        target: &Target,
    ) -> Result<Connection<TcpStream>, StartupError> {
        let addr = self.resolve(target).await?;

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(|source| StartupError::Socket {
            target: target.to_string(),
            source,
        })?;

        debug!("Connecting {} to {} ({})", label, target, addr);
        let attempt = socket.connect(addr);
        let result = match self.connect_timeout {
            Some(limit) => match timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", limit),
                )),
            },
            None => attempt.await,
        };

        let stream = result.map_err(|source| {
            error!("Failed to connect {} to {}: {}", label, addr, source);
            StartupError::Connect {
                target: target.to_string(),
                source,
            }
        })?;

        info!("Connected {} to {} ({})", label, target, addr);
        Ok(Connection::new(label, target.clone(), addr, stream))
    }

    /// Connect both targets of a relay run, first then second
    ///
    /// If the second target fails the first connection is closed before
    /// the error is returned.
    pub async fn connect_pair(
        &self,
        config: &RelayConfig,
    ) -> Result<(Connection<TcpStream>, Connection<TcpStream>), StartupError> {
        let mut first = self.connect("first", &config.first).await?;
        match self.connect("second", &config.second).await {
            Ok(second) => Ok((first, second)),
            Err(e) => {
                first.close().await;
                Err(e)
            }
        }
    }
}
