use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::library::Library;
use crate::protocol::RtspRequest;
use crate::session::ServerSession;

/// Accept loop: one thread per accepted connection, each driving its own
/// [`ServerSession`] (§3, §5). Polls `running` every 50ms so
/// [`crate::Server::stop`] can terminate it promptly.
pub fn accept_loop(
    listener: TcpListener,
    library: Library,
    fps: f64,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, _)) => {
                let library = library.clone();
                thread::spawn(move || {
                    Connection::handle(stream, library, fps);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(e) => {
                if running.load(Ordering::SeqCst) {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            }
        }
    }
    tracing::debug!("accept loop exited");
}

/// A single RTSP client connection: parses requests off the socket and
/// dispatches them to a [`ServerSession`], writing back replies (or
/// silently dropping, on session-id mismatch per §4.5/§9).
struct Connection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    peer_addr: SocketAddr,
    session: Arc<ServerSession>,
}

impl Connection {
    fn handle(stream: TcpStream, library: Library, fps: f64) {
        let peer_addr = match stream.peer_addr() {
            Ok(addr) => addr,
            Err(_) => return,
        };
        tracing::info!(%peer_addr, "client connected");

        let reader_stream = match stream.try_clone() {
            Ok(s) => s,
            Err(_) => return,
        };

        let session = ServerSession::new(peer_addr.ip(), library, fps);
        let mut conn = Connection {
            reader: BufReader::new(reader_stream),
            writer: stream,
            peer_addr,
            session,
        };

        let reason = conn.run();
        conn.session.teardown();
        tracing::info!(%peer_addr, reason, "client disconnected");
    }

    fn run(&mut self) -> &'static str {
        loop {
            let mut request_text = String::new();
            loop {
                let mut line = String::new();
                match self.reader.read_line(&mut line) {
                    Ok(0) => return "connection closed by client",
                    Ok(_) => {
                        request_text.push_str(&line);
                        if line == "\r\n" || line == "\n" {
                            break;
                        }
                    }
                    Err(_) => return "read error",
                }
            }

            if request_text.trim().is_empty() {
                continue;
            }

            match RtspRequest::parse(&request_text) {
                Ok(request) => {
                    tracing::debug!(
                        peer = %self.peer_addr,
                        method = request.method.as_str(),
                        filename = %request.filename,
                        cseq = request.cseq,
                        "request"
                    );

                    match self.session.handle_request(&request) {
                        Some(reply) => {
                            tracing::debug!(peer = %self.peer_addr, status = reply.status, "reply");
                            if self.writer.write_all(reply.serialize().as_bytes()).is_err() {
                                return "write error";
                            }
                        }
                        None => tracing::debug!(peer = %self.peer_addr, "request dropped"),
                    }
                }
                Err(e) => {
                    tracing::warn!(peer = %self.peer_addr, error = %e, "parse error");
                }
            }
        }
    }
}
