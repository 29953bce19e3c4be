//! Shutdown Signal Handling
//!
//! Turns SIGTERM / SIGINT (Ctrl+C on Windows) into a broadcast that ends
//! the running session as if one of its peers had gone away.

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::Result;

/// Fans a single shutdown event out to every subscriber
pub struct ShutdownCoordinator {
    shutdown_tx: broadcast::Sender<()>,
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { shutdown_tx }
    }

    /// Get a shutdown receiver for components to listen for shutdown signals
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Future that completes once shutdown has been requested
    ///
    /// A closed channel is treated as a shutdown request.
    pub fn signalled(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut shutdown_rx = self.subscribe();
        async move {
            let _ = shutdown_rx.recv().await;
        }
    }

    /// Request shutdown without waiting for a signal
    pub fn trigger(&self) {
        if self.shutdown_tx.send(()).is_err() {
            debug!("Shutdown requested with no active subscribers");
        }
    }

    /// Wait for SIGTERM or SIGINT, then broadcast the shutdown
    pub async fn listen_for_signals(&self) -> Result<()> {
        debug!("Starting shutdown signal listener");

        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;
            let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, closing session");
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, closing session");
                }
            }
        }

        #[cfg(windows)]
        {
            signal::ctrl_c().await?;
            info!("Received Ctrl+C, closing session");
        }

        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }

        Ok(())
    }
}
