//! MAVLink frame encoding and stream parsing.
//!
//! ## Frame Format
//!
//! ```text
//! v1: | 0xFE | len | seq | sys | comp | msgid |   payload   | crc16 |
//!     |  1   |  1  |  1  |  1  |  1   |   1   |    len      |   2   |
//!
//! v2: | 0xFD | len | incompat | compat | seq | sys | comp | msgid | payload | crc16 | [sig] |
//!     |  1   |  1  |    1     |   1    |  1  |  1  |  1   |   3   |   len   |   2   |  13   |
//! ```
//!
//! The checksum covers everything after the start byte up to the end of the
//! payload, followed by the message's CRC extra byte. Outgoing frames are
//! always v1; both versions are accepted on input.

use crate::mavlink::crc::frame_checksum;
use crate::mavlink::message::{Message, MessageKind};
use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};
use log::trace;

/// MAVLink 1 start byte.
pub const STX_V1: u8 = 0xFE;
/// MAVLink 2 start byte.
pub const STX_V2: u8 = 0xFD;

const HEADER_LEN_V1: usize = 6;
const HEADER_LEN_V2: usize = 10;
const CHECKSUM_LEN: usize = 2;
const SIGNATURE_LEN: usize = 13;
const INCOMPAT_FLAG_SIGNED: u8 = 0x01;

/// A checksum-verified frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version (1 or 2).
    pub version: u8,
    /// Sender's sequence number.
    pub sequence: u8,
    /// Sender's system id.
    pub system_id: u8,
    /// Sender's component id.
    pub component_id: u8,
    /// Message id.
    pub message_id: u32,
    /// Raw payload (possibly truncated for v2).
    pub payload: Vec<u8>,
}

impl Frame {
    /// Build a v1 frame for `message`.
    #[allow(clippy::cast_possible_truncation)]
    pub fn encode_v1(message: &Message, sequence: u8, system_id: u8, component_id: u8) -> Vec<u8> {
        let kind = message.kind();
        let payload = message.encode_payload();

        let mut buf = Vec::with_capacity(HEADER_LEN_V1 + payload.len() + CHECKSUM_LEN);
        buf.push(STX_V1);
        buf.push(payload.len() as u8);
        buf.push(sequence);
        buf.push(system_id);
        buf.push(component_id);
        buf.push(kind.id() as u8);
        buf.extend_from_slice(&payload);

        let crc = frame_checksum(&buf[1..], kind.crc_extra());
        buf.extend_from_slice(&crc.to_le_bytes());
        buf
    }

    /// Decode the payload into a [`Message`].
    pub fn message(&self) -> Result<Message> {
        let kind = MessageKind::from_id(self.message_id)
            .ok_or_else(|| Error::Protocol(format!("unknown message id {}", self.message_id)))?;
        Message::decode(kind, &self.payload)
    }
}

/// Incremental parser turning a byte stream into frames.
///
/// Bytes before a start marker are discarded. Frames with an unknown message
/// id or a bad checksum are skipped by resynchronising one byte later.
#[derive(Debug, Default)]
pub struct FrameParser {
    buf: Vec<u8>,
}

impl FrameParser {
    /// Create an empty parser.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Extract the next complete, verified frame, if any.
    pub fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let start = self
                .buf
                .iter()
                .position(|&b| b == STX_V1 || b == STX_V2);
            match start {
                Some(0) => {},
                Some(n) => {
                    self.buf.drain(..n);
                },
                None => {
                    self.buf.clear();
                    return None;
                },
            }

            match self.try_frame() {
                Candidate::Incomplete => return None,
                Candidate::Invalid => {
                    self.buf.drain(..1);
                },
                Candidate::Valid(frame, consumed) => {
                    self.buf.drain(..consumed);
                    return Some(frame);
                },
            }
        }
    }

    /// Inspect the frame starting at `buf[0]` (a start byte).
    fn try_frame(&self) -> Candidate {
        let buf = &self.buf;
        let v2 = buf[0] == STX_V2;
        let header_len = if v2 { HEADER_LEN_V2 } else { HEADER_LEN_V1 };

        if buf.len() < header_len {
            return Candidate::Incomplete;
        }

        let payload_len = usize::from(buf[1]);
        let (sequence, system_id, component_id, message_id, signed) = if v2 {
            let id = u32::from(buf[7]) | (u32::from(buf[8]) << 8) | (u32::from(buf[9]) << 16);
            (buf[4], buf[5], buf[6], id, buf[2] & INCOMPAT_FLAG_SIGNED != 0)
        } else {
            (buf[2], buf[3], buf[4], u32::from(buf[5]), false)
        };

        let crc_at = header_len + payload_len;
        let total = crc_at + CHECKSUM_LEN + if signed { SIGNATURE_LEN } else { 0 };
        if buf.len() < total {
            return Candidate::Incomplete;
        }

        let Some(kind) = MessageKind::from_id(message_id) else {
            trace!("Skipping frame with unknown message id {message_id}");
            return Candidate::Invalid;
        };

        let expected = LittleEndian::read_u16(&buf[crc_at..crc_at + CHECKSUM_LEN]);
        let actual = frame_checksum(&buf[1..crc_at], kind.crc_extra());
        if expected != actual {
            trace!("CRC mismatch on {kind}: expected {expected:#06x}, got {actual:#06x}");
            return Candidate::Invalid;
        }

        let frame = Frame {
            version: if v2 { 2 } else { 1 },
            sequence,
            system_id,
            component_id,
            message_id,
            payload: buf[header_len..crc_at].to_vec(),
        };
        Candidate::Valid(frame, total)
    }
}

enum Candidate {
    Incomplete,
    Invalid,
    Valid(Frame, usize),
}
