//! Session state shared by both peers (§3, §4.5, §4.6), plus the
//! server- and client-side session objects built on top of it.

pub mod client;
pub mod server;

pub use client::ClientSession;
pub use server::ServerSession;

/// The three-state session lifecycle (§3, §4.5). Transitions only occur
/// through a successful (status-200) command/reply pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Before SETUP succeeds (or after TEARDOWN).
    Init,
    /// SETUP succeeded; media is not flowing.
    Ready,
    /// PLAY succeeded; media is flowing.
    Playing,
}

/// A fresh, random 6-digit decimal session id, as assigned by the server on
/// the first successful SETUP of a connection (§9).
pub fn random_session_id() -> u32 {
    use rand::Rng;
    rand::rng().random_range(100_000..1_000_000)
}
