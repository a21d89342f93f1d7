//! # Session Protocol Codec
//!
//! Decoding and encoding rules for the risk-control session protocol.
//!
//! ## Layout
//!
//! A frame is a 16-byte header (10-byte NUL-padded ASCII session, u32
//! sequence, u16 block count, all integers little-endian) followed by
//! `block_count` length-prefixed blocks. The first byte of each block
//! payload is a one-character type tag; see [`payload`] for the dispatch
//! table. A frame with zero blocks is a heartbeat.
//!
//! ## Error isolation
//!
//! - A truncated declared length aborts the current frame only
//!   ([`ProtocolError::FrameTruncated`]); blocks decoded before the
//!   truncation point are unaffected when iterating via [`BlockReader`].
//! - A malformed payload is isolated to its block
//!   ([`ProtocolError::PayloadMalformed`]); the caller skips it and keeps
//!   going with the rest of the frame.
//! - An unparseable order event never fails: it yields a sentinel
//!   parse-error event so the audit sequence stays gap-free.
//!
//! This crate is purely synchronous and in-memory; transports live in the
//! `network` crate.

pub mod command;
pub mod error;
pub mod frame;
pub mod order_event;
pub mod payload;

pub use command::Command;
pub use error::{ProtocolError, ProtocolResult};
pub use frame::{
    decode_frame, decode_header, encode_frame, BlockReader, FrameHeader, SessionFrame,
    FRAME_HEADER_LEN, SESSION_LEN,
};
pub use order_event::decode_order_event;
pub use payload::{decode_payload, Payload};
