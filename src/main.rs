//! revpipe - Reverse TCP Pipe
//!
//! Connects out to two endpoints and relays bytes between them until
//! either side closes.

use clap::error::ErrorKind;
use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;

use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use revpipe::config::{ConfigManager, RawArgs, RelayConfig};
use revpipe::error::{StartupError, EXIT_OK, EXIT_USAGE};
use revpipe::{DuplexRelay, EndpointConnector, Session, ShutdownCoordinator};

/// CLI arguments for revpipe
#[derive(Parser, Debug)]
#[command(name = "revpipe")]
#[command(about = "Join two outbound TCP connections into one pipe")]
#[command(version)]
#[command(long_about = "
revpipe connects to HOST1:PORT1, then to HOST2:PORT2, and copies bytes
between the two connections until either peer closes or an I/O error
occurs. Both peers are dialled; nothing listens.

Exit codes:
  0   session ran and ended
  25  invalid port or option value
  26  host name could not be resolved
  27  socket could not be created
  28  connection failed
  30  bad usage

Environment variables:
  REVPIPE_LOG_LEVEL        - Log level (trace, debug, info, warn, error)
  REVPIPE_CONNECT_TIMEOUT  - Connect timeout (e.g., 5s, 500ms)
")]
pub struct CliArgs {
    /// First remote host
    #[arg(value_name = "HOST1")]
    pub host1: String,

    /// First remote port
    #[arg(value_name = "PORT1", allow_hyphen_values = true)]
    pub port1: String,

    /// Second remote host
    #[arg(value_name = "HOST2")]
    pub host2: String,

    /// Second remote port
    #[arg(value_name = "PORT2", allow_hyphen_values = true)]
    pub port2: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, help = "Log level")]
    pub log_level: Option<String>,

    /// Enable verbose logging (sets log level to debug)
    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    /// Give up on each connect attempt after this long
    #[arg(long, value_name = "DURATION", help = "Connect timeout (e.g., 5s)")]
    pub connect_timeout: Option<String>,

    /// Print final session statistics as JSON on stdout
    #[arg(long, help = "Print session statistics as JSON")]
    pub stats_json: bool,
}

impl From<CliArgs> for RawArgs {
    fn from(args: CliArgs) -> Self {
        RawArgs {
            host1: args.host1,
            port1: args.port1,
            host2: args.host2,
            port2: args.port2,
            log_level: args.log_level,
            verbose: args.verbose,
            connect_timeout: args.connect_timeout,
            stats_json: args.stats_json,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => {
            e.print().ok();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => exit_code(EXIT_OK),
                _ => exit_code(EXIT_USAGE),
            };
        }
    };

    let config = match ConfigManager::from_args(args.into()) {
        Ok(config) => config,
        Err(e) => return report_startup_error(&e),
    };

    init_tracing(&config);

    match run(&config).await {
        Ok(()) => exit_code(EXIT_OK),
        Err(e) => report_startup_error(&e),
    }
}

/// Connect both targets, then relay until the session ends
async fn run(config: &RelayConfig) -> Result<(), StartupError> {
    info!(
        "Starting revpipe v{}: {} <-> {}",
        env!("CARGO_PKG_VERSION"),
        config.first,
        config.second
    );
    debug!("Connect timeout: {:?}", config.connect_timeout);

    let connector = EndpointConnector::from_config(config);
    let (first, second) = connector.connect_pair(config).await?;
    let session = Session::new(first, second);

    let coordinator = Arc::new(ShutdownCoordinator::new());
    let shutdown = coordinator.signalled();
    let signal_handle = {
        let coordinator = Arc::clone(&coordinator);
        tokio::spawn(async move {
            if let Err(e) = coordinator.listen_for_signals().await {
                error!("Error setting up signal handlers: {}", e);
            }
        })
    };

    let outcome = DuplexRelay::new().run_until(session, shutdown).await;
    signal_handle.abort();

    if config.stats_json {
        match serde_json::to_string(&outcome.stats) {
            Ok(line) => println!("{}", line),
            Err(e) => error!("Failed to serialize session statistics: {}", e),
        }
    }

    info!("Session ended: {}", outcome.end);
    Ok(())
}

fn report_startup_error(err: &StartupError) -> ExitCode {
    eprintln!("revpipe: {} error: {}", err.kind(), err);
    exit_code(err.exit_code())
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

/// Initialize tracing/logging
fn init_tracing(config: &RelayConfig) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(true),
        )
        .with(env_filter)
        .init();
}
