//! TCP accept loop for RTSP signaling (§3, §5). Each accepted connection
//! gets its own [`crate::ServerSession`] and a dedicated thread running a
//! request/reply loop; RTP delivery is a lazily-bound per-session UDP socket
//! owned by that session, not a shared transport.

pub mod tcp;
