//! Fixed-layout wire structs for the session protocol.
//!
//! All integers on the wire are little-endian; the `zerocopy` byteorder
//! types make that explicit at the field level so these structs can be read
//! directly from an unaligned payload slice with no copying or manual
//! offset arithmetic.

use zerocopy::byteorder::{LittleEndian, F64, I32};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

/// Width of the fixed instrument code field in a Position payload.
pub const INSTRUMENT_CODE_LEN: usize = 12;

/// Body of a 'P' (Position) block, after the tag byte.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct PositionWire {
    /// Instrument code, ASCII, NUL-padded.
    pub instrument: [u8; INSTRUMENT_CODE_LEN],
    pub net: I32<LittleEndian>,
    pub open_long: I32<LittleEndian>,
    pub open_short: I32<LittleEndian>,
}

/// Body of a 'C' (Capital) block, after the tag byte.
#[repr(C)]
#[derive(Debug, Clone, Copy, AsBytes, FromBytes, FromZeroes, Unaligned)]
pub struct CapitalWire {
    pub open: F64<LittleEndian>,
    pub accrued: F64<LittleEndian>,
    pub total: F64<LittleEndian>,
}

/// Decode a fixed-width, NUL-padded ASCII code field.
pub fn trim_code(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_matches('\0')
        .to_string()
}
