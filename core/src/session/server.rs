//! [`ServerSession`]: per-connection state machine and send loop (§4.5).

use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::container::FrameContainer;
use crate::error::Result;
use crate::library::Library;
use crate::media::{fragment, rtp};
use crate::protocol::{Method, RtspReply, RtspRequest};
use crate::session::{SessionState, random_session_id};

/// Frames are capped at this size; larger ones are reported as
/// [`crate::Error::Overflow`] by the container and skipped.
const MAX_FRAME_SIZE: usize = 4 * 1024 * 1024;

struct Worker {
    stop: Arc<Mutex<bool>>,
    condvar: Arc<Condvar>,
    handle: JoinHandle<()>,
}

impl Worker {
    fn signal_stop(&self) {
        *self.stop.lock() = true;
        self.condvar.notify_all();
    }

    fn join(self) {
        let _ = self.handle.join();
    }
}

/// One client's RTSP control connection plus the media it is streaming.
/// Always held behind an `Arc` so the send loop can share it with the
/// control thread that drives [`handle_request`](Self::handle_request).
pub struct ServerSession {
    peer_ip: IpAddr,
    library: Library,
    fps: f64,
    ssrc: u32,
    state: Mutex<SessionState>,
    session_id: Mutex<u32>,
    container: Mutex<Option<FrameContainer>>,
    client_addr: Mutex<Option<SocketAddr>>,
    udp_socket: Mutex<Option<Arc<UdpSocket>>>,
    worker: Mutex<Option<Worker>>,
}

impl ServerSession {
    /// Create a fresh, unconfigured session for a newly accepted connection.
    pub fn new(peer_ip: IpAddr, library: Library, fps: f64) -> Arc<Self> {
        Arc::new(Self {
            peer_ip,
            library,
            fps,
            ssrc: rtp::random_ssrc(),
            state: Mutex::new(SessionState::Init),
            session_id: Mutex::new(0),
            container: Mutex::new(None),
            client_addr: Mutex::new(None),
            udp_socket: Mutex::new(None),
            worker: Mutex::new(None),
        })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// The session id assigned on first successful SETUP, or 0 if none yet.
    pub fn session_id(&self) -> u32 {
        *self.session_id.lock()
    }

    /// Dispatch one parsed request. Returns `None` when the request must be
    /// silently dropped — a non-SETUP request whose session id does not
    /// match the one assigned to this connection (§4.5, §9).
    pub fn handle_request(self: &Arc<Self>, request: &RtspRequest) -> Option<RtspReply> {
        if request.method != Method::Setup {
            let assigned = self.session_id();
            if assigned != 0 && request.session_id != assigned {
                tracing::warn!(
                    assigned,
                    received = request.session_id,
                    method = request.method.as_str(),
                    "session id mismatch, dropping request"
                );
                return None;
            }
        }

        let reply = match request.method {
            Method::Setup => self.handle_setup(request),
            Method::Play => self.handle_play(request),
            Method::Pause => self.handle_pause(request),
            Method::Seek => self.handle_seek(request),
            Method::Teardown => self.handle_teardown(request),
        };
        Some(reply)
    }

    fn handle_setup(&self, request: &RtspRequest) -> RtspReply {
        let path = match self.library.resolve(&request.filename) {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(filename = %request.filename, "SETUP for unknown file");
                return RtspReply::not_found(request.cseq);
            }
        };
        let container = match FrameContainer::open(&path) {
            Ok(c) => c,
            Err(_) => return RtspReply::not_found(request.cseq),
        };

        *self.container.lock() = Some(container);
        if let Some(port) = request.client_port {
            *self.client_addr.lock() = Some(SocketAddr::new(self.peer_ip, port));
        }

        let mut session_id = self.session_id.lock();
        if *session_id == 0 {
            *session_id = random_session_id();
        }
        let id = *session_id;
        drop(session_id);

        *self.state.lock() = SessionState::Ready;
        tracing::info!(session_id = id, filename = %request.filename, "SETUP complete");
        RtspReply::ok(request.cseq, id)
    }

    fn handle_play(self: &Arc<Self>, request: &RtspRequest) -> RtspReply {
        let id = self.session_id();
        if self.container.lock().is_none() {
            tracing::warn!("PLAY before SETUP");
            return RtspReply::server_error(request.cseq, id);
        }
        let client_addr = match *self.client_addr.lock() {
            Some(addr) => addr,
            None => {
                tracing::warn!(session_id = id, "PLAY with no client transport recorded");
                return RtspReply::server_error(request.cseq, id);
            }
        };

        if self.udp_socket.lock().is_none() {
            match UdpSocket::bind("0.0.0.0:0") {
                Ok(socket) => *self.udp_socket.lock() = Some(Arc::new(socket)),
                Err(e) => {
                    tracing::error!(error = %e, "failed to bind RTP send socket");
                    return RtspReply::server_error(request.cseq, id);
                }
            }
        }

        if self.state() != SessionState::Playing {
            *self.state.lock() = SessionState::Playing;
            self.spawn_send_loop(client_addr);
        }
        tracing::info!(session_id = id, "PLAY");
        RtspReply::ok(request.cseq, id)
    }

    fn handle_pause(self: &Arc<Self>, request: &RtspRequest) -> RtspReply {
        let id = self.session_id();
        self.stop_send_loop();
        *self.state.lock() = SessionState::Ready;
        tracing::info!(session_id = id, "PAUSE");
        RtspReply::ok(request.cseq, id)
    }

    fn handle_seek(&self, request: &RtspRequest) -> RtspReply {
        let id = self.session_id();
        let Some(target) = request.seek_frame else {
            return RtspReply::server_error(request.cseq, id);
        };
        let mut container = self.container.lock();
        match container.as_mut() {
            Some(c) => match c.seek_frame(target) {
                Ok(actual) => {
                    drop(container);
                    if let Some(worker) = self.worker.lock().as_ref() {
                        worker.condvar.notify_all();
                    }
                    tracing::info!(session_id = id, target, actual, "SEEK");
                    RtspReply::ok(request.cseq, id)
                }
                Err(e) => {
                    tracing::warn!(session_id = id, error = %e, "SEEK failed");
                    RtspReply::server_error(request.cseq, id)
                }
            },
            None => RtspReply::server_error(request.cseq, id),
        }
    }

    fn handle_teardown(self: &Arc<Self>, request: &RtspRequest) -> RtspReply {
        let id = self.session_id();
        self.teardown();
        tracing::info!(session_id = id, "TEARDOWN");
        RtspReply::ok(request.cseq, id)
    }

    /// Join the send loop, release the UDP socket and container, and return
    /// to INIT. Called both by an explicit TEARDOWN and by the control
    /// thread when the TCP connection drops (§3, §5, §7: "the control
    /// thread owns final cleanup").
    pub fn teardown(&self) {
        self.stop_send_loop();
        *self.udp_socket.lock() = None;
        *self.container.lock() = None;
        *self.state.lock() = SessionState::Init;
    }

    fn spawn_send_loop(self: &Arc<Self>, client_addr: SocketAddr) {
        let stop = Arc::new(Mutex::new(false));
        let condvar = Arc::new(Condvar::new());
        let session = Arc::clone(self);
        let stop_clone = Arc::clone(&stop);
        let condvar_clone = Arc::clone(&condvar);

        let handle = thread::spawn(move || {
            session.send_loop(client_addr, stop_clone, condvar_clone);
        });

        *self.worker.lock() = Some(Worker {
            stop,
            condvar,
            handle,
        });
    }

    fn stop_send_loop(&self) {
        if let Some(worker) = self.worker.lock().take() {
            worker.signal_stop();
            worker.join();
        }
    }

    /// Reads frames from the container at the configured fps, packetizes
    /// each into one or more fragmented datagrams, and sends them over UDP
    /// (§4.5, §4.2, §4.3).
    fn send_loop(&self, client_addr: SocketAddr, stop: Arc<Mutex<bool>>, condvar: Arc<Condvar>) {
        let interval = Duration::from_secs_f64(1.0 / self.fps);
        let mut buf = Vec::new();

        loop {
            if *stop.lock() {
                break;
            }

            let read_result = {
                let mut container = self.container.lock();
                match container.as_mut() {
                    Some(c) => c.next_frame(&mut buf, MAX_FRAME_SIZE),
                    None => break,
                }
            };

            match read_result {
                Ok(Some(_)) => {
                    if let Some(socket) = self.udp_socket.lock().clone() {
                        if let Err(e) = self.send_frame(&socket, client_addr, &buf) {
                            tracing::error!(error = %e, "failed to send RTP datagram");
                            break;
                        }
                    }
                }
                Ok(None) => {
                    tracing::debug!("container reached EOF, send loop exiting");
                    break;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "frame read error, skipping frame");
                }
            }

            let mut stopped = stop.lock();
            if *stopped {
                break;
            }
            let _ = condvar.wait_for(&mut stopped, interval);
            if *stopped {
                break;
            }
        }

        *self.state.lock() = SessionState::Ready;
    }

    fn send_frame(&self, socket: &UdpSocket, client_addr: SocketAddr, frame: &[u8]) -> Result<()> {
        let frame_index = {
            let container = self.container.lock();
            container.as_ref().map(|c| c.current_frame()).unwrap_or(0)
        };
        // current_frame() already points past the frame just read.
        let sequence_number = frame_index.saturating_sub(1) as u16;
        let header = rtp::RtpHeader::for_frame(sequence_number, self.ssrc);

        let total = fragment::fragments_needed(frame.len());
        for index in 0..total {
            let offset = index * fragment::MTU_PAYLOAD;
            let end = (offset + fragment::MTU_PAYLOAD).min(frame.len());
            let frag_header = fragment::encode(index as u8, total as u8, frame.len() as u32);

            let mut payload = Vec::with_capacity(fragment::HEADER_LEN + (end - offset));
            payload.extend_from_slice(&frag_header);
            payload.extend_from_slice(&frame[offset..end]);

            let datagram = rtp::encode(&header, &payload);
            socket.send_to(&datagram, client_addr)?;
        }

        tracing::debug!(sequence_number, fragments = total, len = frame.len(), "frame sent");
        Ok(())
    }
}
