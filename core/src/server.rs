//! [`Server`]: top-level orchestrator that binds a TCP listener and runs the
//! accept loop in its own thread (§4.11).

use std::net::TcpListener;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use crate::error::{Error, Result};
use crate::library::Library;
use crate::transport::tcp;

/// Frames are delivered at this rate unless overridden (§3).
pub const DEFAULT_FPS: f64 = crate::container::FPS;

/// Sessions have no idle-eviction logic in this system; this knob is
/// retained for config-shape parity with the teacher's `ServerConfig`.
pub const DEFAULT_SESSION_TIMEOUT_SECS: u64 = 60;

/// Server-level configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directory SETUP filenames are resolved against.
    pub media_root: std::path::PathBuf,
    /// Frames per second the send loop paces itself to.
    pub fps: f64,
    /// Unused beyond documentation (§4.11) — no session GC is implemented.
    pub session_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            media_root: std::path::PathBuf::from("."),
            fps: DEFAULT_FPS,
            session_timeout_secs: DEFAULT_SESSION_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Set the media root directory SETUP filenames resolve against.
    pub fn with_media_root(mut self, root: impl Into<std::path::PathBuf>) -> Self {
        self.media_root = root.into();
        self
    }

    /// Override the send-loop frame rate.
    pub fn with_fps(mut self, fps: f64) -> Self {
        self.fps = fps;
        self
    }

    /// Override the (currently unenforced) session timeout.
    pub fn with_session_timeout_secs(mut self, secs: u64) -> Self {
        self.session_timeout_secs = secs;
        self
    }
}

/// High-level RTSP server orchestrator. Owns the TCP listener and runs one
/// accept loop thread; every accepted connection gets its own
/// [`crate::ServerSession`] (§3, §5).
pub struct Server {
    bind_addr: String,
    config: ServerConfig,
    running: Arc<AtomicBool>,
}

impl Server {
    pub fn new(bind_addr: &str) -> Self {
        Self::with_config(bind_addr, ServerConfig::default())
    }

    pub fn with_config(bind_addr: &str, config: ServerConfig) -> Self {
        Self {
            bind_addr: bind_addr.to_string(),
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Bind the listener and spawn the accept loop. Returns once the
    /// listener is bound; the accept loop itself runs in the background.
    pub fn start(&mut self) -> Result<()> {
        if self.running.load(Ordering::SeqCst) {
            return Err(Error::AlreadyRunning);
        }

        let listener = TcpListener::bind(&self.bind_addr)?;
        listener.set_nonblocking(true)?;

        self.running.store(true, Ordering::SeqCst);

        let library = Library::new(self.config.media_root.clone());
        let fps = self.config.fps;
        let running = self.running.clone();

        tracing::info!(addr = %self.bind_addr, media_root = %self.config.media_root.display(), "RTSP server listening");

        thread::spawn(move || {
            tcp::accept_loop(listener, library, fps, running);
        });

        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("server stopping");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
