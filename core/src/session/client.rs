//! [`ClientSession`]: mirrors [`crate::ServerSession`] from the consumer's
//! side — a reply listener thread, a UDP receive listener thread, and a set
//! of synchronous-looking methods the UI thread calls (§4.6, §6).

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::Result;
use crate::jitter::{EofDetector, JitterBuffer};
use crate::protocol::{Method, RtspReply};
use crate::reassembler::Reassembler;
use crate::session::SessionState;
use crate::stats::RtpStats;

/// Largest single UDP datagram this client will read.
const RECV_BUF_SIZE: usize = 2048;

/// A pending request awaiting its reply, matched positionally (§4.6).
struct Pending {
    cseq: u32,
    method: Method,
}

pub struct ClientSession {
    writer: Mutex<TcpStream>,
    filename: String,
    state: Mutex<SessionState>,
    session_id: Mutex<u32>,
    next_cseq: Mutex<u32>,
    pending: Mutex<VecDeque<Pending>>,
    jitter: Arc<JitterBuffer>,
    reassembler: Mutex<Reassembler>,
    stats: Arc<Mutex<RtpStats>>,
    eof: Mutex<EofDetector>,
    ended: Mutex<bool>,
    stop: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl ClientSession {
    /// Connect to `server_ip:server_port`, bind a UDP socket on `rtp_port`
    /// (0 lets the OS choose one), and send the initial SETUP for `filename`.
    pub fn connect(
        server_ip: &str,
        server_port: u16,
        filename: &str,
        rtp_port: u16,
    ) -> Result<Arc<Self>> {
        let stream = TcpStream::connect((server_ip, server_port))?;
        let reader_stream = stream.try_clone()?;

        let udp_socket = UdpSocket::bind(("0.0.0.0", rtp_port))?;
        udp_socket.set_read_timeout(Some(Duration::from_secs(1)))?;

        let session = Arc::new(Self {
            writer: Mutex::new(stream),
            filename: filename.to_string(),
            state: Mutex::new(SessionState::Init),
            session_id: Mutex::new(0),
            next_cseq: Mutex::new(1),
            pending: Mutex::new(VecDeque::new()),
            jitter: Arc::new(JitterBuffer::new()),
            reassembler: Mutex::new(Reassembler::new()),
            stats: Arc::new(Mutex::new(RtpStats::new())),
            eof: Mutex::new(EofDetector::new()),
            ended: Mutex::new(false),
            stop: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
        });

        session.spawn_reply_listener(reader_stream);
        session.spawn_udp_listener(udp_socket);
        session.send_request(Method::Setup, Some(rtp_port), None)?;
        Ok(session)
    }

    /// Current client-observed session state.
    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    /// Session id assigned by the server, or 0 before SETUP completes.
    pub fn session_id(&self) -> u32 {
        *self.session_id.lock()
    }

    pub fn play(&self) -> Result<()> {
        self.send_request(Method::Play, None, None)
    }

    pub fn pause(&self) -> Result<()> {
        self.send_request(Method::Pause, None, None)
    }

    /// Seek to `frame`, clearing stale buffered frames so playback resumes
    /// cleanly at the new position (§5, §4.8).
    pub fn seek_frame(&self, frame: i64) -> Result<()> {
        self.jitter.clear();
        self.eof.lock().reset();
        *self.ended.lock() = false;
        self.send_request(Method::Seek, None, Some(frame))
    }

    /// Tear down the session and stop the background listener threads.
    pub fn stop(&self) -> Result<()> {
        let result = self.send_request(Method::Teardown, None, None);
        self.stop.store(true, Ordering::SeqCst);
        result
    }

    /// Dequeue the next frame, if any. Updates end-of-stream tracking
    /// (§4.8).
    pub fn get_frame(&self, out: &mut Vec<u8>) -> bool {
        let got = self.jitter.dequeue(out);
        let fill = self.jitter.fill_percent();
        if self.eof.lock().observe(got, fill) {
            *self.ended.lock() = true;
        }
        got
    }

    /// Jitter buffer fill level, `0..=100`.
    pub fn get_buffer_level(&self) -> u8 {
        self.jitter.fill_percent()
    }

    /// Snapshot of packet/frame accounting.
    pub fn get_stats(&self) -> RtpStats {
        *self.stats.lock()
    }

    pub fn is_buffering(&self) -> bool {
        self.jitter.is_buffering()
    }

    /// Whether end-of-stream has been declared since the last SETUP/SEEK.
    pub fn is_ended(&self) -> bool {
        *self.ended.lock()
    }

    fn send_request(
        &self,
        method: Method,
        client_port: Option<u16>,
        seek_frame: Option<i64>,
    ) -> Result<()> {
        let cseq = {
            let mut next = self.next_cseq.lock();
            let c = *next;
            *next += 1;
            c
        };
        let session_id = self.session_id();

        let mut text = format!(
            "{} {} RTSP/1.0\r\nCSeq: {}\r\n",
            method.as_str(),
            self.filename,
            cseq
        );
        if session_id != 0 {
            text.push_str(&format!("Session: {session_id}\r\n"));
        }
        if let Some(port) = client_port {
            text.push_str(&format!("Transport: RTP/UDP;client_port={port}\r\n"));
        }
        if let Some(frame) = seek_frame {
            text.push_str(&format!("X-Frame: {frame}\r\n"));
        }
        text.push_str("\r\n");

        self.pending.lock().push_back(Pending { cseq, method });
        self.writer.lock().write_all(text.as_bytes())?;
        Ok(())
    }

    fn spawn_reply_listener(self: &Arc<Self>, stream: TcpStream) {
        let session = Arc::clone(self);
        let handle = thread::spawn(move || {
            let mut reader = BufReader::new(stream);
            loop {
                let mut raw = String::new();
                loop {
                    let mut line = String::new();
                    match reader.read_line(&mut line) {
                        Ok(0) => {
                            tracing::info!("control connection closed by server");
                            return;
                        }
                        Ok(_) => {
                            raw.push_str(&line);
                            if line == "\r\n" || line == "\n" {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "control read error");
                            return;
                        }
                    }
                }
                match RtspReply::parse(&raw) {
                    Ok(reply) => session.on_reply(reply),
                    Err(e) => tracing::warn!(error = %e, "malformed reply"),
                }
            }
        });
        self.threads.lock().push(handle);
    }

    fn spawn_udp_listener(self: &Arc<Self>, socket: UdpSocket) {
        let session = Arc::clone(self);
        let handle = thread::spawn(move || {
            let mut buf = [0u8; RECV_BUF_SIZE];
            while !session.stop.load(Ordering::SeqCst) {
                match socket.recv(&mut buf) {
                    Ok(len) => {
                        let mut reassembler = session.reassembler.lock();
                        if let Err(e) =
                            reassembler.process_packet(&buf[..len], &session.stats, &session.jitter)
                        {
                            tracing::warn!(error = %e, "malformed RTP datagram");
                        }
                    }
                    Err(ref e)
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut => {}
                    Err(e) => {
                        tracing::error!(error = %e, "UDP receive error");
                        break;
                    }
                }
            }
        });
        self.threads.lock().push(handle);
    }

    fn on_reply(&self, reply: RtspReply) {
        let Some(pending) = self.pending.lock().pop_front() else {
            tracing::warn!(status = reply.status, "reply with no pending request");
            return;
        };
        if pending.cseq != reply.cseq {
            tracing::debug!(
                expected = pending.cseq,
                got = reply.cseq,
                "CSeq mismatch (advisory only, position is authoritative)"
            );
        }
        if reply.status != 200 {
            tracing::warn!(status = reply.status, method = pending.method.as_str(), "request failed");
            return;
        }
        if reply.session_id != 0 {
            *self.session_id.lock() = reply.session_id;
        }

        let mut state = self.state.lock();
        *state = match (*state, pending.method) {
            (SessionState::Init, Method::Setup) => SessionState::Ready,
            (SessionState::Ready, Method::Play) => SessionState::Playing,
            (SessionState::Playing, Method::Pause) => SessionState::Ready,
            (SessionState::Playing, Method::Seek) => SessionState::Playing,
            (SessionState::Ready, Method::Seek) => SessionState::Ready,
            (_, Method::Teardown) => SessionState::Init,
            (other, _) => other,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::time::Instant;

    fn poll_until<F: Fn() -> bool>(condition: F, timeout: Duration) -> bool {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    fn read_one_request(stream: &mut TcpStream) -> String {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut raw = String::new();
        loop {
            let mut line = String::new();
            let n = reader.read_line(&mut line).unwrap();
            if n == 0 {
                break;
            }
            raw.push_str(&line);
            if line == "\r\n" || line == "\n" {
                break;
            }
        }
        raw
    }

    #[test]
    fn setup_reply_advances_state_and_session_id() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let raw = read_one_request(&mut stream);
            assert!(raw.starts_with("SETUP "));
            stream
                .write_all(b"RTSP/1.0 200 OK\r\nCSeq: 1\r\nSession: 424242\r\n\r\n")
                .unwrap();
        });

        let session = ClientSession::connect(
            &addr.ip().to_string(),
            addr.port(),
            "movie.mjpeg",
            0,
        )
        .unwrap();

        assert!(poll_until(
            || session.state() == SessionState::Ready,
            Duration::from_secs(2)
        ));
        assert_eq!(session.session_id(), 424242);

        session.stop.store(true, Ordering::SeqCst);
        server.join().unwrap();
    }

    #[test]
    fn non_200_reply_does_not_advance_state() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let _ = read_one_request(&mut stream);
            stream
                .write_all(b"RTSP/1.0 404 Not Found\r\nCSeq: 1\r\nSession: 0\r\n\r\n")
                .unwrap();
        });

        let session = ClientSession::connect(
            &addr.ip().to_string(),
            addr.port(),
            "missing.mjpeg",
            0,
        )
        .unwrap();

        thread::sleep(Duration::from_millis(100));
        assert_eq!(session.state(), SessionState::Init);
        assert_eq!(session.session_id(), 0);

        session.stop.store(true, Ordering::SeqCst);
        server.join().unwrap();
    }
}
