//! The 12-byte RTP-style header (§3/§4.2).
//!
//! ```text
//!  0                   1                   2                   3
//!  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |V=2|P|X|  CC   |M|     PT      |       Sequence Number         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                           Timestamp                           |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |                             SSRC                              |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! Unlike a stateful packetizer, this is a plain encode/decode pair: the
//! caller (the send loop in [`crate::session::ServerSession`]) owns the
//! sequence number, since the spec ties it to the container's frame index
//! rather than an internally incrementing counter.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{Error, ProtocolErrorKind};

/// Size in bytes of the fixed RTP header.
pub const HEADER_LEN: usize = 12;

/// The only payload type this system ever emits: JPEG (RFC 3551 static
/// assignment for unreserved dynamic video).
pub const PAYLOAD_TYPE_JPEG: u8 = 26;

/// Parsed or to-be-encoded RTP-style header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    /// Protocol version; always 2.
    pub version: u8,
    /// Padding flag; always false in this system.
    pub padding: bool,
    /// Extension flag; always false in this system.
    pub extension: bool,
    /// CSRC count; always 0 (no mixers).
    pub csrc_count: u8,
    /// Marker bit; unused by this protocol, always false.
    pub marker: bool,
    /// Payload type; always [`PAYLOAD_TYPE_JPEG`] on the wire.
    pub payload_type: u8,
    /// Sequence number. Per §4.5, this is the container's current frame
    /// index taken modulo 2^16 — every fragment of one frame shares it.
    pub sequence_number: u16,
    /// Coarse wall-clock timestamp, set by the server at encode time.
    pub timestamp: u32,
    /// Synchronization source identifier, random per session.
    pub ssrc: u32,
}

impl RtpHeader {
    /// Build a header for one outgoing datagram: version 2, no padding/extension,
    /// JPEG payload type, the given sequence number and SSRC, and the current
    /// wall clock as the timestamp.
    pub fn for_frame(sequence_number: u16, ssrc: u32) -> Self {
        Self {
            version: 2,
            padding: false,
            extension: false,
            csrc_count: 0,
            marker: false,
            payload_type: PAYLOAD_TYPE_JPEG,
            sequence_number,
            timestamp: wall_clock_timestamp(),
            ssrc,
        }
    }
}

/// Coarse wall-clock timestamp used for the RTP `timestamp` field. The
/// client does not interpret it (§4.2), so seconds-since-epoch truncated to
/// 32 bits is sufficient.
pub fn wall_clock_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// Encode `header` followed by `payload` into a single datagram buffer.
pub fn encode(header: &RtpHeader, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&header_bytes(header));
    out.extend_from_slice(payload);
    out
}

fn header_bytes(header: &RtpHeader) -> [u8; HEADER_LEN] {
    let first_byte = (header.version << 6)
        | ((header.padding as u8) << 5)
        | ((header.extension as u8) << 4)
        | (header.csrc_count & 0x0F);
    let second_byte = ((header.marker as u8) << 7) | (header.payload_type & 0x7F);

    let mut bytes = [0u8; HEADER_LEN];
    bytes[0] = first_byte;
    bytes[1] = second_byte;
    bytes[2..4].copy_from_slice(&header.sequence_number.to_be_bytes());
    bytes[4..8].copy_from_slice(&header.timestamp.to_be_bytes());
    bytes[8..12].copy_from_slice(&header.ssrc.to_be_bytes());
    bytes
}

/// Decode the fixed 12-byte header from the front of `bytes`, returning the
/// header and a view of the remaining payload. Rejects input shorter than
/// [`HEADER_LEN`].
pub fn decode(bytes: &[u8]) -> crate::error::Result<(RtpHeader, &[u8])> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Protocol(ProtocolErrorKind::InvalidHeader));
    }

    let version = bytes[0] >> 6;
    let padding = (bytes[0] & 0b0010_0000) != 0;
    let extension = (bytes[0] & 0b0001_0000) != 0;
    let csrc_count = bytes[0] & 0x0F;
    let marker = (bytes[1] & 0x80) != 0;
    let payload_type = bytes[1] & 0x7F;
    let sequence_number = u16::from_be_bytes([bytes[2], bytes[3]]);
    let timestamp = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    let ssrc = u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);

    let header = RtpHeader {
        version,
        padding,
        extension,
        csrc_count,
        marker,
        payload_type,
        sequence_number,
        timestamp,
        ssrc,
    };
    Ok((header, &bytes[HEADER_LEN..]))
}

/// Generate a random SSRC for a new session (RFC 3550 §8.1 convention: pick
/// randomly to minimize collision probability between independent sessions).
pub fn random_ssrc() -> u32 {
    use rand::Rng;
    rand::rng().random::<u32>()
}
