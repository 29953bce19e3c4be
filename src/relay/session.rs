//! Relay Session

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::time::{Instant, SystemTime};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::config::Target;

/// Which of the two connections an event belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    First,
    Second,
}

impl Side {
    /// The connection bytes from this side are forwarded to
    pub fn other(self) -> Side {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::First => write!(f, "first"),
            Side::Second => write!(f, "second"),
        }
    }
}

/// Lifecycle of a connection after it has been established
///
/// A connection that is still being set up only exists as the connector's
/// pending connect; once a `Connection` value exists it is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closed,
}

/// An established byte stream bound to one target
#[derive(Debug)]
pub struct Connection<S> {
    label: &'static str,
    target: Target,
    peer_addr: SocketAddr,
    stream: S,
    state: ConnectionState,
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(label: &'static str, target: Target, peer_addr: SocketAddr, stream: S) -> Self {
        Self {
            label,
            target,
            peer_addr,
            stream,
            state: ConnectionState::Open,
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// Read whatever is available, up to `buf.len()` bytes
    ///
    /// `Ok(0)` is end of stream.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if !self.is_open() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        self.stream.read(buf).await
    }

    /// Issue a single write and report how much the transport accepted
    pub async fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.is_open() {
            return Err(io::ErrorKind::NotConnected.into());
        }
        self.stream.write(buf).await
    }

    /// Close the connection; returns `false` if it was already closed
    pub async fn close(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Closed;

        if let Err(e) = self.stream.shutdown().await {
            debug!("Shutdown of {} connection to {} reported: {}", self.label, self.peer_addr, e);
        }
        debug!("Closed {} connection to {} ({})", self.label, self.target, self.peer_addr);
        true
    }
}

/// Why a session ended
#[derive(Debug)]
pub enum SessionEnd {
    /// A peer sent end of stream
    PeerClosed(Side),
    /// Reading from a connection failed
    ReadFailed(Side, io::Error),
    /// Writing to a connection failed
    WriteFailed(Side, io::Error),
    /// A connection accepted zero bytes of a non-empty write
    WriteRejected(Side),
    /// The process was asked to stop
    Shutdown,
}

impl SessionEnd {
    /// Whether the session ended on an I/O failure rather than an orderly close
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            SessionEnd::ReadFailed(..) | SessionEnd::WriteFailed(..) | SessionEnd::WriteRejected(_)
        )
    }

    /// The connection that triggered the end, if any
    pub fn side(&self) -> Option<Side> {
        match self {
            SessionEnd::PeerClosed(side)
            | SessionEnd::ReadFailed(side, _)
            | SessionEnd::WriteFailed(side, _)
            | SessionEnd::WriteRejected(side) => Some(*side),
            SessionEnd::Shutdown => None,
        }
    }
}

impl fmt::Display for SessionEnd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionEnd::PeerClosed(side) => write!(f, "{} peer closed the connection", side),
            SessionEnd::ReadFailed(side, e) => write!(f, "read from {} peer failed: {}", side, e),
            SessionEnd::WriteFailed(side, e) => write!(f, "write to {} peer failed: {}", side, e),
            SessionEnd::WriteRejected(side) => write!(f, "{} peer accepted no data", side),
            SessionEnd::Shutdown => write!(f, "shutdown requested"),
        }
    }
}

/// Byte counters, one per direction
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct Traffic {
    pub(crate) first_to_second: u64,
    pub(crate) second_to_first: u64,
}

impl Traffic {
    pub(crate) fn record(&mut self, from: Side, bytes: usize) {
        match from {
            Side::First => self.first_to_second += bytes as u64,
            Side::Second => self.second_to_first += bytes as u64,
        }
    }
}

/// The pairing of both connections for one relay run
#[derive(Debug)]
pub struct Session<S> {
    pub session_id: String,
    pub start_time: Instant,
    pub(crate) first: Connection<S>,
    pub(crate) second: Connection<S>,
    pub(crate) traffic: Traffic,
}

/// Statistics for a finished session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub session_id: String,
    pub first_addr: SocketAddr,
    pub second_addr: SocketAddr,
    pub start_time: SystemTime,
    pub duration_ms: u64,
    pub bytes_first_to_second: u64,
    pub bytes_second_to_first: u64,
    pub total_bytes: u64,
    pub end_reason: String,
    pub ended_on_error: bool,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Pair two open connections into a session
    pub fn new(first: Connection<S>, second: Connection<S>) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        debug!(
            "Creating relay session: {} ({} <-> {})",
            session_id,
            first.peer_addr(),
            second.peer_addr()
        );

        Self {
            session_id,
            start_time: Instant::now(),
            first,
            second,
            traffic: Traffic::default(),
        }
    }

    pub fn connection(&self, side: Side) -> &Connection<S> {
        match side {
            Side::First => &self.first,
            Side::Second => &self.second,
        }
    }

    pub fn bytes_first_to_second(&self) -> u64 {
        self.traffic.first_to_second
    }

    pub fn bytes_second_to_first(&self) -> u64 {
        self.traffic.second_to_first
    }

    pub fn total_bytes(&self) -> u64 {
        self.bytes_first_to_second() + self.bytes_second_to_first()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.start_time.elapsed()
    }

    /// Close both connections; safe to call any number of times
    pub async fn close(&mut self) {
        let first_closed = self.first.close().await;
        let second_closed = self.second.close().await;
        if first_closed || second_closed {
            debug!("Session {} connections closed", self.session_id);
        }
    }

    /// Generate session statistics
    pub fn to_stats(&self, end: &SessionEnd) -> SessionStats {
        let duration = self.duration();

        SessionStats {
            session_id: self.session_id.clone(),
            first_addr: self.first.peer_addr(),
            second_addr: self.second.peer_addr(),
            start_time: SystemTime::now() - duration,
            duration_ms: duration.as_millis() as u64,
            bytes_first_to_second: self.bytes_first_to_second(),
            bytes_second_to_first: self.bytes_second_to_first(),
            total_bytes: self.total_bytes(),
            end_reason: end.to_string(),
            ended_on_error: end.is_error(),
        }
    }

    /// Log session statistics
    pub fn log_stats(&self, end: &SessionEnd) {
        let duration = self.duration();

        if end.is_error() {
            warn!(
                session_id = %self.session_id,
                first_target = %self.first.target(),
                first_addr = %self.first.peer_addr(),
                second_target = %self.second.target(),
                second_addr = %self.second.peer_addr(),
                duration_ms = duration.as_millis() as u64,
                bytes_first_to_second = self.bytes_first_to_second(),
                bytes_second_to_first = self.bytes_second_to_first(),
                reason = %end,
                "Relay session ended on I/O error"
            );
        } else {
            info!(
                session_id = %self.session_id,
                first_target = %self.first.target(),
                first_addr = %self.first.peer_addr(),
                second_target = %self.second.target(),
                second_addr = %self.second.peer_addr(),
                duration_ms = duration.as_millis() as u64,
                bytes_first_to_second = self.bytes_first_to_second(),
                bytes_second_to_first = self.bytes_second_to_first(),
                reason = %end,
                "Relay session completed"
            );
        }
    }
}
