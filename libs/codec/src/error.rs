//! Protocol-level errors for session frame and payload decoding.

use thiserror::Error;

/// Result type for decoding operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Decode errors with enough context to tell a short read from a bad block.
///
/// None of these are fatal to the process: a truncated frame terminates the
/// current read attempt, a malformed payload is skipped block-locally, and
/// the surrounding loops keep running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The source ran out of bytes before a declared length was satisfied.
    #[error("truncated frame: need {need} bytes, got {got} ({context})")]
    FrameTruncated {
        need: usize,
        got: usize,
        context: &'static str,
    },

    /// A block's payload is too short for the fixed layout its tag declares.
    #[error("malformed '{tag}' payload: need {need} bytes after tag, got {got}")]
    PayloadMalformed { tag: char, need: usize, got: usize },
}
