//! Error types for the MJPEG/RTSP streaming library.

use std::fmt;

/// Errors that can occur anywhere in the streaming stack.
///
/// Variants map to the failure kinds named by the error-handling design:
///
/// - **Protocol**: [`Protocol`](Self::Protocol) — malformed RTSP requests/replies.
/// - **Transport**: [`Io`](Self::Io).
/// - **Container**: [`NotFound`](Self::NotFound), [`Corruption`](Self::Corruption),
///   [`Overflow`](Self::Overflow).
/// - **Server**: [`AlreadyRunning`](Self::AlreadyRunning).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying I/O or socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// SETUP targeted a file that does not exist under the media root.
    #[error("not found: {filename}")]
    NotFound {
        /// The filename that was requested.
        filename: String,
    },

    /// Malformed RTSP request or reply.
    #[error("protocol error: {kind}")]
    Protocol(ProtocolErrorKind),

    /// FrameContainer encountered bytes that do not match either accepted format.
    #[error("container corruption: {0}")]
    Corruption(String),

    /// A frame (or fragment) exceeded the receiver's buffer capacity.
    #[error("overflow: frame of {frame_size} bytes exceeds capacity {capacity}")]
    Overflow {
        /// Size of the frame that did not fit.
        frame_size: usize,
        /// Capacity of the buffer it was copied into.
        capacity: usize,
    },

    /// [`Server::start`](crate::Server::start) was called while already running.
    #[error("server already running")]
    AlreadyRunning,
}

/// Specific kind of RTSP protocol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolErrorKind {
    /// Input was empty (no request line).
    EmptyRequest,
    /// Request line did not have the expected `Method URI Version` format.
    InvalidRequestLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// The request line named a method outside {SETUP, PLAY, PAUSE, TEARDOWN, SEEK}.
    UnknownMethod,
}

impl fmt::Display for ProtocolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyRequest => write!(f, "empty request"),
            Self::InvalidRequestLine => write!(f, "invalid request line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::UnknownMethod => write!(f, "unknown method"),
        }
    }
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
