//! Outbound command frames.
//!
//! Four directive kinds, all single-block unsequenced frames built through
//! [`crate::frame::encode_frame`]. Connectivity enforcement (NotConnected)
//! is the transport's job; this module only produces bytes.

use crate::frame::encode_frame;
use types::ControlDirective;

/// Tag bytes for outbound directives.
pub mod tags {
    pub const SET_CONTROL: u8 = b'S';
    pub const GET_CONTROLS_HISTORY: u8 = b'G';
    pub const SHUTDOWN: u8 = b's';
    pub const REWIND: u8 = b'R';
}

/// A client directive to the risk-control server.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Push a scoped control setting; an empty value clears it.
    SetControl(ControlDirective),
    /// Ask the server to replay the control change history.
    GetControlsHistory,
    /// Ask the server to shut down.
    Shutdown,
    /// Replay server state from a sequence number; 0 replays from the start.
    Rewind { last_seen: u32 },
}

impl Command {
    pub fn tag(&self) -> u8 {
        match self {
            Command::SetControl(_) => tags::SET_CONTROL,
            Command::GetControlsHistory => tags::GET_CONTROLS_HISTORY,
            Command::Shutdown => tags::SHUTDOWN,
            Command::Rewind { .. } => tags::REWIND,
        }
    }

    /// Encode this directive as one complete wire frame.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::SetControl(directive) => {
                encode_frame(tags::SET_CONTROL, directive.to_string().as_bytes())
            }
            Command::GetControlsHistory => encode_frame(tags::GET_CONTROLS_HISTORY, &[]),
            Command::Shutdown => encode_frame(tags::SHUTDOWN, &[]),
            Command::Rewind { last_seen } => {
                encode_frame(tags::REWIND, &last_seen.to_le_bytes())
            }
        }
    }
}
