//! # mjpeg_rtsp — a teaching-grade RTSP/RTP streaming library for Motion-JPEG
//!
//! A small Rust library for hosting a library of MJPEG files and serving them
//! to any number of concurrent clients over a simplified RTSP control channel
//! (TCP) plus an RTP-style datagram channel (UDP). It deliberately does not
//! aim for RFC 2326/3550 compliance: no SDP, no RTCP, no interleaved TCP mode,
//! no authentication. What it does implement — session state machines, frame
//! containers with seek, fragmentation/reassembly, and a jitter buffer — is
//! specified precisely enough to be a complete, testable media stack.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │  Adapters (CLI binaries: server, client)  │
//! ├──────────────────────────────────────────┤
//! │  Server        — public API, orchestrator│
//! │  Library       — filename → path mapping │
//! ├──────────────────────────────────────────┤
//! │  Protocol      — RTSP request/reply wire │
//! │  Session       — state machine, transport│
//! ├──────────────────────────────────────────┤
//! │  Transport     — TCP signaling, UDP data │
//! │  Media         — RTP + fragment headers  │
//! │  Container     — MJPEG frame reader/seek │
//! └──────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use mjpeg_rtsp::{Server, ServerConfig};
//!
//! let config = ServerConfig::default().with_media_root("./videos");
//! let mut server = Server::with_config("0.0.0.0:8554", config);
//! server.start().unwrap();
//! ```
//!
//! ## Crate layout
//!
//! - [`server`] — High-level [`Server`] orchestrator and [`ServerConfig`].
//! - [`library`] — Resolves a SETUP filename against a media-root directory.
//! - [`protocol`] — RTSP request/reply parsing and serialization.
//! - [`session`] — RTSP session state machine, server and client sides.
//! - [`transport`] — TCP accept loop for signaling, UDP sockets for RTP data.
//! - [`media`] — [`media::rtp`] (RtpHeader) and [`media::fragment`] (FragmentHeader).
//! - [`container`] — [`container::FrameContainer`], the MJPEG frame reader.
//! - [`reassembler`] — Client-side fragment reassembly.
//! - [`jitter`] — Client-side jitter buffer and adaptive pacing.
//! - [`stats`] — [`stats::RtpStats`] packet/frame accounting.
//! - [`error`] — [`Error`] enum and [`Result`] alias.

pub mod container;
pub mod error;
pub mod jitter;
pub mod library;
pub mod media;
pub mod protocol;
pub mod reassembler;
pub mod server;
pub mod session;
pub mod stats;
pub mod transport;

pub use container::FrameContainer;
pub use error::{Error, Result};
pub use jitter::JitterBuffer;
pub use reassembler::Reassembler;
pub use server::{Server, ServerConfig};
pub use session::{ClientSession, ServerSession, SessionState};
pub use stats::RtpStats;
