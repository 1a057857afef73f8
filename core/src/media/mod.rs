//! RTP-style framing: the fixed 12-byte header and the 8-byte application
//! fragment header layered on top of it.
//!
//! A single MJPEG frame is split into one or more UDP datagrams, each shaped:
//!
//! ```text
//! offset 0..11  : RtpHeader        (rtp::RtpHeader)
//! offset 12..19 : FragmentHeader   (fragment::FragmentHeader)
//! offset 20..   : JPEG payload fragment
//! ```
//!
//! Both headers are plain encode/decode pairs rather than stateful
//! packetizers — [`crate::session::ServerSession`] drives sequencing and
//! fragmentation directly, since there is exactly one codec to support.

pub mod fragment;
pub mod rtp;
