//! Session frame codec.
//!
//! Knows the byte layout of frames and blocks and nothing about payload
//! semantics. Decoding comes in two shapes: [`decode_frame`] for a complete
//! buffer (the datagram path, where a datagram is always one whole frame)
//! and [`decode_header`] + [`BlockReader`] for callers that want to process
//! blocks as they are decoded, so a truncation late in a frame does not
//! discard the blocks that came before it.

use crate::error::{ProtocolError, ProtocolResult};

/// Width of the fixed session identifier field.
pub const SESSION_LEN: usize = 10;

/// Session field + u32 sequence + u16 block count.
pub const FRAME_HEADER_LEN: usize = SESSION_LEN + 4 + 2;

/// Session identifier stamped on all outbound command frames.
const OUTBOUND_SESSION: &[u8; SESSION_LEN] = b"SESSION   ";

/// Decoded frame header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    /// Session identifier, trailing NULs trimmed.
    pub session: String,
    /// Sequence number; 0 means unsequenced (heartbeats, outbound commands).
    pub sequence: u32,
    pub block_count: u16,
}

impl FrameHeader {
    pub fn is_heartbeat(&self) -> bool {
        self.block_count == 0
    }
}

/// A fully decoded frame with owned block payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFrame {
    pub session: String,
    pub sequence: u32,
    pub blocks: Vec<Vec<u8>>,
}

impl SessionFrame {
    /// A frame with zero blocks signals liveness only and carries no payload.
    pub fn is_heartbeat(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Decode the fixed 16-byte frame header from the start of `data`.
pub fn decode_header(data: &[u8]) -> ProtocolResult<FrameHeader> {
    if data.len() < FRAME_HEADER_LEN {
        return Err(ProtocolError::FrameTruncated {
            need: FRAME_HEADER_LEN,
            got: data.len(),
            context: "frame header",
        });
    }

    let session = String::from_utf8_lossy(&data[..SESSION_LEN])
        .trim_end_matches('\0')
        .to_string();
    let sequence = u32::from_le_bytes([
        data[SESSION_LEN],
        data[SESSION_LEN + 1],
        data[SESSION_LEN + 2],
        data[SESSION_LEN + 3],
    ]);
    let block_count = u16::from_le_bytes([data[SESSION_LEN + 4], data[SESSION_LEN + 5]]);

    Ok(FrameHeader {
        session,
        sequence,
        block_count,
    })
}

/// Iterator over the length-prefixed blocks of a frame body.
///
/// Yields `Ok(payload)` per non-empty block; zero-length blocks are skipped
/// without being yielded. A declared length that exceeds the remaining bytes
/// yields one `Err(FrameTruncated)` and then the iterator is exhausted, so
/// blocks already yielded are unaffected by the truncation.
pub struct BlockReader<'a> {
    body: &'a [u8],
    offset: usize,
    remaining: u16,
}

impl<'a> BlockReader<'a> {
    /// `body` is the frame content immediately after the 16-byte header.
    pub fn new(body: &'a [u8], block_count: u16) -> Self {
        Self {
            body,
            offset: 0,
            remaining: block_count,
        }
    }
}

impl<'a> Iterator for BlockReader<'a> {
    type Item = ProtocolResult<&'a [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.remaining == 0 {
                return None;
            }
            if self.offset + 2 > self.body.len() {
                self.remaining = 0;
                return Some(Err(ProtocolError::FrameTruncated {
                    need: self.offset + 2,
                    got: self.body.len(),
                    context: "block length",
                }));
            }
            let length =
                u16::from_le_bytes([self.body[self.offset], self.body[self.offset + 1]]) as usize;
            self.offset += 2;
            self.remaining -= 1;

            if self.offset + length > self.body.len() {
                self.remaining = 0;
                return Some(Err(ProtocolError::FrameTruncated {
                    need: self.offset + length,
                    got: self.body.len(),
                    context: "block payload",
                }));
            }
            let payload = &self.body[self.offset..self.offset + length];
            self.offset += length;

            if payload.is_empty() {
                continue;
            }
            return Some(Ok(payload));
        }
    }
}

/// Strict whole-buffer decode: header plus every declared block.
///
/// Used where the input is known to be one complete frame (datagrams,
/// round-trip tests). Fails on the first truncation.
pub fn decode_frame(data: &[u8]) -> ProtocolResult<SessionFrame> {
    let header = decode_header(data)?;
    let mut blocks = Vec::with_capacity(header.block_count as usize);
    for block in BlockReader::new(&data[FRAME_HEADER_LEN..], header.block_count) {
        blocks.push(block?.to_vec());
    }
    Ok(SessionFrame {
        session: header.session,
        sequence: header.sequence,
        blocks,
    })
}

/// Encode one outbound command frame: fixed session, sequence 0, a single
/// block of `1 + body.len()` bytes whose first byte is the type tag.
///
/// The layout mirrors the decode contract exactly, so
/// `decode_frame(&encode_frame(tag, body))` yields one block of `tag ++ body`.
pub fn encode_frame(tag: u8, body: &[u8]) -> Vec<u8> {
    let block_len = 1 + body.len();
    let mut out = Vec::with_capacity(FRAME_HEADER_LEN + 2 + block_len);
    out.extend_from_slice(OUTBOUND_SESSION);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&(block_len as u16).to_le_bytes());
    out.push(tag);
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with_blocks(session: &[u8], sequence: u32, blocks: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        let mut padded = [0u8; SESSION_LEN];
        padded[..session.len()].copy_from_slice(session);
        out.extend_from_slice(&padded);
        out.extend_from_slice(&sequence.to_le_bytes());
        out.extend_from_slice(&(blocks.len() as u16).to_le_bytes());
        for block in blocks {
            out.extend_from_slice(&(block.len() as u16).to_le_bytes());
            out.extend_from_slice(block);
        }
        out
    }

    #[test]
    fn heartbeat_frame_has_no_blocks() {
        let raw = frame_with_blocks(b"RISK01", 0, &[]);
        let frame = decode_frame(&raw).unwrap();
        assert!(frame.is_heartbeat());
        assert_eq!(frame.session, "RISK01");
        assert_eq!(frame.sequence, 0);
    }

    #[test]
    fn session_field_trims_trailing_nuls() {
        let raw = frame_with_blocks(b"AB", 7, &[b"rX"]);
        let frame = decode_frame(&raw).unwrap();
        assert_eq!(frame.session, "AB");
        assert_eq!(frame.sequence, 7);
        assert_eq!(frame.blocks, vec![b"rX".to_vec()]);
    }

    #[test]
    fn zero_length_blocks_are_skipped() {
        let raw = frame_with_blocks(b"S", 1, &[b"", b"Ix", b""]);
        let frame = decode_frame(&raw).unwrap();
        assert_eq!(frame.blocks.len(), 1);
        assert_eq!(frame.blocks[0], b"Ix");
    }

    #[test]
    fn truncated_header_is_reported() {
        let err = decode_frame(&[0u8; 5]).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::FrameTruncated { need: 16, got: 5, .. }
        ));
    }

    #[test]
    fn truncated_block_aborts_after_prior_blocks() {
        // One good block, then a block declaring more bytes than remain.
        let mut raw = frame_with_blocks(b"S", 1, &[b"Ia"]);
        // Patch block count to 2 and append a lying length prefix.
        raw[SESSION_LEN + 4..SESSION_LEN + 6].copy_from_slice(&2u16.to_le_bytes());
        raw.extend_from_slice(&100u16.to_le_bytes());
        raw.extend_from_slice(b"short");

        let header = decode_header(&raw).unwrap();
        let mut reader = BlockReader::new(&raw[FRAME_HEADER_LEN..], header.block_count);

        assert_eq!(reader.next().unwrap().unwrap(), b"Ia");
        assert!(matches!(
            reader.next().unwrap(),
            Err(ProtocolError::FrameTruncated { .. })
        ));
        assert!(reader.next().is_none());

        // The strict decode reports the same truncation.
        assert!(decode_frame(&raw).is_err());
    }

    #[test]
    fn encode_decode_round_trip() {
        let raw = encode_frame(b'S', b"GLOBAL,Halt,1");
        let frame = decode_frame(&raw).unwrap();
        // The outbound session field is space-padded, not NUL-padded, so the
        // trim leaves it intact.
        assert_eq!(frame.session, "SESSION   ");
        assert_eq!(frame.sequence, 0);
        assert_eq!(frame.blocks.len(), 1);
        assert_eq!(frame.blocks[0][0], b'S');
        assert_eq!(&frame.blocks[0][1..], b"GLOBAL,Halt,1");
    }

    #[test]
    fn encode_empty_body_round_trip() {
        let raw = encode_frame(b's', &[]);
        let frame = decode_frame(&raw).unwrap();
        assert_eq!(frame.blocks, vec![vec![b's']]);
    }
}
