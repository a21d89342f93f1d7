//! Transport error taxonomy.
//!
//! Protocol-level failures stay in `codec`; this layer only reports
//! connection lifecycle and socket problems.

use std::io;
use std::net::Ipv4Addr;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TransportError>;

#[derive(Debug, Error)]
pub enum TransportError {
    /// A command was submitted while the stream transport was down.
    #[error("not connected to the control server")]
    NotConnected,

    #[error("connection to {endpoint} failed: {source}")]
    ConnectionFailed {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout {
        operation: &'static str,
        timeout_ms: u64,
    },

    #[error("multicast group {group}:{port} setup failed: {source}")]
    Multicast {
        group: Ipv4Addr,
        port: u16,
        #[source]
        source: io::Error,
    },

    #[error("socket i/o failed: {0}")]
    Io(#[from] io::Error),
}
