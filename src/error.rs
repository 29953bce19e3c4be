//! Startup Error Taxonomy
//!
//! Every failure that can happen before a session is established maps to
//! exactly one variant here, and every failure class maps to its own exit
//! code.

use std::io;

/// Exit code for a session that ran and ended (EOF, I/O error or signal)
pub const EXIT_OK: i32 = 0;
/// Exit code for a bad invocation
pub const EXIT_USAGE: i32 = 30;
/// Exit code for a port or option value that does not validate
pub const EXIT_CONFIG: i32 = 25;
/// Exit code for a host that cannot be resolved
pub const EXIT_RESOLUTION: i32 = 26;
/// Exit code for a socket that cannot be created
pub const EXIT_SOCKET: i32 = 27;
/// Exit code for a refused, unreachable or timed out connect
pub const EXIT_CONNECT: i32 = 28;

/// Fatal errors raised while setting up a session
#[derive(Debug, err_derive::Error)]
pub enum StartupError {
    #[error(display = "usage: {}", _0)]
    Usage(String),

    #[error(display = "invalid target port '{}'", _0)]
    InvalidPort(String),

    #[error(display = "invalid value for {}: {}", option, reason)]
    InvalidOption { option: String, reason: String },

    #[error(display = "failed to resolve '{}': {}", host, reason)]
    Resolution { host: String, reason: String },

    #[error(display = "failed to create socket for {}: {}", target, source)]
    Socket {
        target: String,
        #[error(source)]
        source: io::Error,
    },

    #[error(display = "failed to connect to {}: {}", target, source)]
    Connect {
        target: String,
        #[error(source)]
        source: io::Error,
    },
}

impl StartupError {
    /// Process exit code reported for this failure
    pub fn exit_code(&self) -> i32 {
        match self {
            StartupError::Usage(_) => EXIT_USAGE,
            StartupError::InvalidPort(_) | StartupError::InvalidOption { .. } => EXIT_CONFIG,
            StartupError::Resolution { .. } => EXIT_RESOLUTION,
            StartupError::Socket { .. } => EXIT_SOCKET,
            StartupError::Connect { .. } => EXIT_CONNECT,
        }
    }

    /// Short class name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            StartupError::Usage(_) => "usage",
            StartupError::InvalidPort(_) | StartupError::InvalidOption { .. } => "configuration",
            StartupError::Resolution { .. } => "resolution",
            StartupError::Socket { .. } => "socket",
            StartupError::Connect { .. } => "connection",
        }
    }
}
