//! Block payload decoder.
//!
//! Dispatches on the first byte of a block:
//!
//! | tag | payload | layout after tag |
//! |-----|---------|------------------|
//! | 'P' | Position | 12-byte instrument code, i32 net, i32 open-long, i32 open-short |
//! | 'C' | Capital | f64 open, f64 accrued, f64 total |
//! | 'D' 'I' 'W' 'E' | Log | u16 length + text; the tag is the severity |
//! | 'B' | raw I/O bytes | u16 length + bytes, forwarded opaque |
//! | 'r' | Rewind complete | no body |
//! | other | Unknown | discarded by the caller, never aborts the block loop |

use chrono::Utc;
use zerocopy::FromBytes;

use crate::error::{ProtocolError, ProtocolResult};
use types::wire::{trim_code, CapitalWire, PositionWire};
use types::{CapitalSnapshot, LogRecord, PositionSnapshot, Severity};

/// One decoded block payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Position(PositionSnapshot),
    Capital(CapitalSnapshot),
    Log(LogRecord),
    /// Raw order-flow bytes, forwarded opaque; the order-event parser
    /// decodes them further downstream.
    IoBytes(Vec<u8>),
    /// Server finished replaying history after a rewind request.
    RewindComplete,
    /// Unrecognized tag; reported and discarded without aborting the frame.
    Unknown { tag: u8 },
}

/// Decode one block payload. `block` includes the leading tag byte.
///
/// A malformed payload (short for its declared fixed layout) is isolated to
/// this block: the caller skips it and still attempts subsequent blocks.
pub fn decode_payload(block: &[u8]) -> ProtocolResult<Payload> {
    let Some((&tag, body)) = block.split_first() else {
        // Zero-length blocks are filtered by the frame codec; treat a bare
        // empty slice as unknown rather than inventing an error class.
        return Ok(Payload::Unknown { tag: 0 });
    };

    match tag {
        b'P' => {
            let wire = PositionWire::read_from_prefix(body).ok_or(
                ProtocolError::PayloadMalformed {
                    tag: 'P',
                    need: std::mem::size_of::<PositionWire>(),
                    got: body.len(),
                },
            )?;
            Ok(Payload::Position(PositionSnapshot {
                instrument: trim_code(&wire.instrument),
                net: wire.net.get(),
                open_long: wire.open_long.get(),
                open_short: wire.open_short.get(),
                captured_at: Utc::now(),
            }))
        }
        b'C' => {
            let wire = CapitalWire::read_from_prefix(body).ok_or(
                ProtocolError::PayloadMalformed {
                    tag: 'C',
                    need: std::mem::size_of::<CapitalWire>(),
                    got: body.len(),
                },
            )?;
            Ok(Payload::Capital(CapitalSnapshot {
                open: wire.open.get(),
                accrued: wire.accrued.get(),
                total: wire.total.get(),
                captured_at: Utc::now(),
            }))
        }
        b'D' | b'I' | b'W' | b'E' => {
            let severity = match tag {
                b'D' => Severity::Debug,
                b'I' => Severity::Info,
                b'W' => Severity::Warning,
                _ => Severity::Error,
            };
            let text = length_prefixed(tag, body)?;
            Ok(Payload::Log(LogRecord {
                severity,
                message: String::from_utf8_lossy(text).into_owned(),
                timestamp: Utc::now(),
            }))
        }
        b'B' => {
            let bytes = length_prefixed(tag, body)?;
            Ok(Payload::IoBytes(bytes.to_vec()))
        }
        b'r' => Ok(Payload::RewindComplete),
        other => Ok(Payload::Unknown { tag: other }),
    }
}

/// u16 LE length followed by exactly that many bytes.
fn length_prefixed(tag: u8, body: &[u8]) -> ProtocolResult<&[u8]> {
    if body.len() < 2 {
        return Err(ProtocolError::PayloadMalformed {
            tag: tag as char,
            need: 2,
            got: body.len(),
        });
    }
    let length = u16::from_le_bytes([body[0], body[1]]) as usize;
    let rest = &body[2..];
    if rest.len() < length {
        return Err(ProtocolError::PayloadMalformed {
            tag: tag as char,
            need: 2 + length,
            got: body.len(),
        });
    }
    Ok(&rest[..length])
}

#[cfg(test)]
mod tests {
    use super::*;
    use zerocopy::AsBytes;

    fn position_block(instrument: &str, net: i32, long: i32, short: i32) -> Vec<u8> {
        let mut code = [0u8; types::INSTRUMENT_CODE_LEN];
        code[..instrument.len()].copy_from_slice(instrument.as_bytes());
        let wire = PositionWire {
            instrument: code,
            net: net.into(),
            open_long: long.into(),
            open_short: short.into(),
        };
        let mut block = vec![b'P'];
        block.extend_from_slice(wire.as_bytes());
        block
    }

    #[test]
    fn position_round_trip() {
        let block = position_block("PLKGHM000017", -50, 0, 50);
        let Payload::Position(snapshot) = decode_payload(&block).unwrap() else {
            panic!("expected position payload");
        };
        assert_eq!(snapshot.instrument, "PLKGHM000017");
        assert_eq!(snapshot.net, -50);
        assert_eq!(snapshot.open_long, 0);
        assert_eq!(snapshot.open_short, 50);
    }

    #[test]
    fn capital_block_decodes_doubles() {
        let mut block = vec![b'C'];
        block.extend_from_slice(&5000.0f64.to_le_bytes());
        block.extend_from_slice(&2468.89f64.to_le_bytes());
        block.extend_from_slice(&7468.89f64.to_le_bytes());

        let Payload::Capital(snapshot) = decode_payload(&block).unwrap() else {
            panic!("expected capital payload");
        };
        assert_eq!(snapshot.open, 5000.0);
        assert_eq!(snapshot.accrued, 2468.89);
        assert_eq!(snapshot.total, 7468.89);
    }

    #[test]
    fn log_block_carries_severity_from_tag() {
        let text = b"Network latency detected";
        let mut block = vec![b'W'];
        block.extend_from_slice(&(text.len() as u16).to_le_bytes());
        block.extend_from_slice(text);

        let Payload::Log(record) = decode_payload(&block).unwrap() else {
            panic!("expected log payload");
        };
        assert_eq!(record.severity, Severity::Warning);
        assert_eq!(record.message, "Network latency detected");
    }

    #[test]
    fn io_bytes_are_forwarded_opaque() {
        let body = b"8=FIX.4.4|35=D|";
        let mut block = vec![b'B'];
        block.extend_from_slice(&(body.len() as u16).to_le_bytes());
        block.extend_from_slice(body);
        // Extra trailing bytes beyond the declared length must not leak.
        block.extend_from_slice(b"junk");

        assert_eq!(
            decode_payload(&block).unwrap(),
            Payload::IoBytes(body.to_vec())
        );
    }

    #[test]
    fn rewind_marker_has_no_body() {
        assert_eq!(decode_payload(b"r").unwrap(), Payload::RewindComplete);
    }

    #[test]
    fn unknown_tag_is_not_an_error() {
        assert_eq!(
            decode_payload(b"Zwhatever").unwrap(),
            Payload::Unknown { tag: b'Z' }
        );
    }

    #[test]
    fn short_position_payload_is_block_local_error() {
        let err = decode_payload(b"Pshort").unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::PayloadMalformed { tag: 'P', need: 24, got: 5 }
        ));
    }

    #[test]
    fn log_length_beyond_payload_is_malformed() {
        let mut block = vec![b'I'];
        block.extend_from_slice(&100u16.to_le_bytes());
        block.extend_from_slice(b"tiny");
        assert!(matches!(
            decode_payload(&block).unwrap_err(),
            ProtocolError::PayloadMalformed { tag: 'I', .. }
        ));
    }
}
