//! The RTSP text control wire (§4.4): request/reply parsing and
//! serialization for the five supported methods.
//!
//! ```text
//! <METHOD> <filename> RTSP/1.0
//! CSeq: <n>
//! [ Session: <id> ]
//! [ Transport: RTP/UDP;client_port=<p> ]   (SETUP only)
//! [ X-Frame: <n> ]                         (SEEK only)
//!
//! ```
//!
//! Parsing is line-oriented and tolerant of LF-only terminators (`str::lines`
//! already strips an optional trailing `\r`); header names are matched
//! case-insensitively. The URL is reduced to its final path segment.

pub mod request;
pub mod response;

pub use request::{Method, RtspRequest};
pub use response::RtspReply;
