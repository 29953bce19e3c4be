//! revpipe Library
//!
//! Reverse TCP pipe: connects out to two fixed endpoints and relays raw
//! bytes between them until either side closes or fails.

pub mod config;
pub mod connector;
pub mod error;
pub mod relay;
pub mod shutdown;

pub use config::{ConfigManager, RelayConfig, Target};
pub use connector::EndpointConnector;
pub use error::StartupError;
pub use relay::{DuplexRelay, Session};
pub use shutdown::ShutdownCoordinator;

/// Common error type for the relay
pub type Result<T> = anyhow::Result<T>;
