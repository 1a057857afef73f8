//! The 8-byte application fragment header (§3/§4.3), layered after the RTP
//! header on every datagram that carries a fragmented frame.
//!
//! ```text
//! offset 0 : flags           (FIRST = 0x80, LAST = 0x40)
//! offset 1 : fragment index
//! offset 2 : total fragments
//! offset 3 : reserved (always 0)
//! offset 4..7 : total frame size, big-endian
//! ```

use crate::error::{Error, ProtocolErrorKind};

/// Size in bytes of the fragment header.
pub const HEADER_LEN: usize = 8;

/// Maximum JPEG payload bytes carried by a single fragment.
pub const MTU_PAYLOAD: usize = 1400;

/// Set on the fragment carrying `fragment_index == 0`.
pub const FLAG_FIRST: u8 = 0x80;
/// Set on the fragment carrying `fragment_index == total_fragments - 1`.
pub const FLAG_LAST: u8 = 0x40;

/// Parsed or to-be-encoded fragment header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FragmentHeader {
    /// [`FLAG_FIRST`] / [`FLAG_LAST`] bits.
    pub flags: u8,
    /// Zero-based index of this fragment within the frame.
    pub fragment_index: u8,
    /// Total number of fragments the frame was split into.
    pub total_fragments: u8,
    /// Total size in bytes of the reassembled frame.
    pub total_frame_size: u32,
}

impl FragmentHeader {
    /// True if this is the first fragment of a frame.
    pub fn is_first(&self) -> bool {
        self.flags & FLAG_FIRST != 0
    }

    /// True if this is the last fragment of a frame.
    pub fn is_last(&self) -> bool {
        self.flags & FLAG_LAST != 0
    }
}

/// `ceil(frame_size / MTU_PAYLOAD)`, with a minimum of 1 (a zero-byte frame
/// still occupies one fragment).
pub fn fragments_needed(frame_size: usize) -> usize {
    frame_size.div_ceil(MTU_PAYLOAD).max(1)
}

/// Build the header for fragment `index` of `total` fragments belonging to a
/// frame of `frame_size` bytes. Sets FIRST/LAST automatically; `reserved` is
/// always written as 0.
pub fn encode(index: u8, total: u8, frame_size: u32) -> [u8; HEADER_LEN] {
    let mut flags = 0u8;
    if index == 0 {
        flags |= FLAG_FIRST;
    }
    if total == 0 || index == total - 1 {
        flags |= FLAG_LAST;
    }

    let mut bytes = [0u8; HEADER_LEN];
    bytes[0] = flags;
    bytes[1] = index;
    bytes[2] = total;
    bytes[3] = 0; // reserved
    bytes[4..8].copy_from_slice(&frame_size.to_be_bytes());
    bytes
}

/// Inverse of [`encode`]; rejects input shorter than [`HEADER_LEN`].
pub fn decode(bytes: &[u8]) -> crate::error::Result<FragmentHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(Error::Protocol(ProtocolErrorKind::InvalidHeader));
    }
    let total_frame_size = u32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Ok(FragmentHeader {
        flags: bytes[0],
        fragment_index: bytes[1],
        total_fragments: bytes[2],
        total_frame_size,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fragments_needed_rounds_up() {
        assert_eq!(fragments_needed(1), 1);
        assert_eq!(fragments_needed(1400), 1);
        assert_eq!(fragments_needed(1401), 2);
        assert_eq!(fragments_needed(2800), 2);
        assert_eq!(fragments_needed(2801), 3);
    }

    #[test]
    fn single_fragment_has_both_flags() {
        let bytes = encode(0, 1, 512);
        let header = decode(&bytes).unwrap();
        assert!(header.is_first());
        assert!(header.is_last());
    }

    #[test]
    fn middle_fragment_has_neither_flag() {
        let bytes = encode(1, 3, 4096);
        let header = decode(&bytes).unwrap();
        assert!(!header.is_first());
        assert!(!header.is_last());
    }

    #[test]
    fn first_and_last_flags_on_boundaries() {
        let first = decode(&encode(0, 3, 4096)).unwrap();
        assert!(first.is_first());
        assert!(!first.is_last());

        let last = decode(&encode(2, 3, 4096)).unwrap();
        assert!(!last.is_first());
        assert!(last.is_last());
    }

    #[test]
    fn round_trip_preserves_all_fields() {
        for (index, total, size) in [(0u8, 1u8, 1u32), (4, 9, 123_456), (254, 255, u32::MAX)] {
            let encoded = encode(index, total, size);
            let decoded = decode(&encoded).unwrap();
            assert_eq!(decoded.fragment_index, index);
            assert_eq!(decoded.total_fragments, total);
            assert_eq!(decoded.total_frame_size, size);
        }
    }

    #[test]
    fn decode_rejects_short_input() {
        assert!(decode(&[0u8; 7]).is_err());
    }

    #[test]
    fn reserved_byte_is_zero() {
        let bytes = encode(0, 1, 10);
        assert_eq!(bytes[3], 0);
    }
}
