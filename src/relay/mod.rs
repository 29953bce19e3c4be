//! Data Relay Module
//!
//! Pairs two established connections into a session and forwards bytes
//! between them until one side goes away.

pub mod engine;
pub mod session;

pub use engine::{DuplexRelay, SessionOutcome, BUFFER_SIZE};
pub use session::{Connection, ConnectionState, Session, SessionEnd, SessionStats, Side};
