//! Configuration Module
//!
//! Turns startup parameters and environment variables into a validated
//! `RelayConfig`.

pub mod manager;
pub mod types;

pub use manager::{parse_port, ConfigManager, RawArgs};
pub use types::*;
