//! # Session Transports
//!
//! Network layer for the riskwatch session protocol. Two independent
//! transports feed the same dispatch surface:
//!
//! - [`StreamAdapter`] - bidirectional TCP connection to the control
//!   server. Frames are length-delimited per the session protocol and
//!   commands are written back on the same socket.
//! - [`MulticastAdapter`] - receive-only UDP multicast mirror of the
//!   broadcast feed. Each datagram carries one complete frame.
//!
//! Decoded payloads are fanned out through a [`SessionDispatcher`], a
//! set of broadcast channels keyed by event kind. Subscribers that fall
//! behind lose the oldest events rather than stalling the read loop.

pub mod dispatch;
pub mod error;
pub mod multicast;
pub mod stream;

pub use dispatch::SessionDispatcher;
pub use error::{Result, TransportError};
pub use multicast::{MulticastAdapter, MulticastConfig};
pub use stream::{StreamAdapter, StreamConfig};
