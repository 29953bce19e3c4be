//! Endpoint Connector
//!
//! Turns each `Target` into a live outbound TCP connection.

pub mod endpoint;

pub use endpoint::EndpointConnector;
