//! Duplex Relay Loop

use std::future::{pending, Future};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, trace};

use super::session::{Session, SessionEnd, SessionStats, Side};

/// Bytes read from a connection per readiness cycle
pub const BUFFER_SIZE: usize = 4096;

/// How a relay run finished
#[derive(Debug)]
pub struct SessionOutcome {
    pub end: SessionEnd,
    pub stats: SessionStats,
}

/// Shuttles bytes between the two connections of a session
///
/// The loop has two states. While RUNNING it waits for either connection
/// to become readable, reads one buffer and forwards it with a single write
/// to the other connection. Any end of stream or I/O error moves it to
/// CLOSING, which closes both connections and returns.
///
/// Writes are not readiness-checked and are issued once: a short write that
/// reports success is counted as success and the unwritten tail is dropped.
/// A peer that stops draining its receive buffer stalls the whole loop.
#[derive(Debug, Clone)]
pub struct DuplexRelay {
    buffer_size: usize,
}

impl Default for DuplexRelay {
    fn default() -> Self {
        Self::new()
    }
}

impl DuplexRelay {
    pub fn new() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
        }
    }

    /// Relay until either side closes or fails
    pub async fn run<S>(&self, session: Session<S>) -> SessionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        self.run_until(session, pending::<()>()).await
    }

    /// Relay until either side closes or fails, or `shutdown` completes
    pub async fn run_until<S, F>(&self, mut session: Session<S>, shutdown: F) -> SessionOutcome
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        info!(
            "Starting duplex relay for session {} ({} <-> {})",
            session.session_id,
            session.first.peer_addr(),
            session.second.peer_addr()
        );

        let end = self.relay_loop(&mut session, shutdown).await;

        session.close().await;
        session.log_stats(&end);
        let stats = session.to_stats(&end);

        SessionOutcome { end, stats }
    }

    async fn relay_loop<S, F>(&self, session: &mut Session<S>, shutdown: F) -> SessionEnd
    where
        S: AsyncRead + AsyncWrite + Unpin,
        F: Future<Output = ()>,
    {
        let Session {
            session_id,
            first,
            second,
            traffic,
            ..
        } = session;

        let mut first_buf = vec![0u8; self.buffer_size];
        let mut second_buf = vec![0u8; self.buffer_size];
        tokio::pin!(shutdown);

        loop {
            // First is polled before second, so when both are readable in
            // one cycle the first side is serviced and the second waits for
            // the next cycle.
            let (from, result) = tokio::select! {
                biased;
                _ = &mut shutdown => return SessionEnd::Shutdown,
                result = first.read(&mut first_buf) => (Side::First, result),
                result = second.read(&mut second_buf) => (Side::Second, result),
            };

            let n = match result {
                Ok(0) => {
                    debug!("Session {}: {} peer sent end of stream", session_id, from);
                    return SessionEnd::PeerClosed(from);
                }
                Ok(n) => n,
                Err(e) => return SessionEnd::ReadFailed(from, e),
            };

            let (data, dest) = match from {
                Side::First => (&first_buf[..n], &mut *second),
                Side::Second => (&second_buf[..n], &mut *first),
            };

            match dest.write(data).await {
                Ok(0) => return SessionEnd::WriteRejected(from.other()),
                Ok(written) => {
                    if written < n {
                        debug!(
                            "Session {}: short write to {} peer ({} of {} bytes)",
                            session_id,
                            from.other(),
                            written,
                            n
                        );
                    }
                    trace!("Session {}: {} -> {}: {} bytes", session_id, from, from.other(), written);
                    traffic.record(from, written);
                }
                Err(e) => return SessionEnd::WriteFailed(from.other(), e),
            }
        }
    }
}
