//! Scenario-level tests against a loopback TCP+UDP server (§8), mirroring
//! the teacher's `full_handshake_options_describe_setup_play` structure:
//! bind to an ephemeral port, drive raw requests over a `TcpStream`, read
//! blank-line-terminated replies.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use mjpeg_rtsp::{Server, ServerConfig};

fn rtsp_request(stream: &mut TcpStream, request: &str) -> std::io::Result<String> {
    stream.write_all(request.as_bytes())?;
    stream.flush()?;

    let mut reader = BufReader::new(stream.try_clone()?);
    let mut response = String::new();
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            break;
        }
        response.push_str(&line);
        if line == "\r\n" || line == "\n" {
            break;
        }
    }
    Ok(response)
}

fn session_id_of(reply: &str) -> &str {
    reply
        .lines()
        .find(|l| l.to_lowercase().starts_with("session:"))
        .and_then(|l| l.split(':').nth(1))
        .map(|v| v.trim())
        .unwrap_or("")
}

fn start_server(bind_addr: &str, media_root: &std::path::Path) -> Server {
    let config = ServerConfig::default().with_media_root(media_root);
    let mut server = Server::with_config(bind_addr, config);
    server.start().expect("server start");
    // accept_loop binds synchronously inside start(); give the background
    // thread a moment to begin accepting before the first connect.
    std::thread::sleep(Duration::from_millis(50));
    server
}

fn connect(bind_addr: &str) -> TcpStream {
    let addr = bind_addr.to_socket_addrs().unwrap().next().unwrap();
    let stream = TcpStream::connect_timeout(&addr, Duration::from_secs(2)).expect("connect");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
    stream.set_write_timeout(Some(Duration::from_secs(2))).unwrap();
    stream
}

/// Write a minimal raw-JPEG MJPEG fixture: two SOI/EOI-delimited frames.
fn write_fixture(dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut frame1 = vec![0xFFu8, 0xD8];
    frame1.extend(std::iter::repeat(0xAA).take(16));
    frame1.extend_from_slice(&[0xFF, 0xD9]);
    let mut frame2 = vec![0xFFu8, 0xD8];
    frame2.extend(std::iter::repeat(0xBB).take(16));
    frame2.extend_from_slice(&[0xFF, 0xD9]);
    let mut contents = frame1;
    contents.extend(frame2);
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn setup_not_found_returns_404() {
    let dir = std::env::temp_dir().join(format!("mjpeg-rtsp-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let bind_addr = "127.0.0.1:18601";
    let mut server = start_server(bind_addr, &dir);

    let mut stream = connect(bind_addr);
    let req = "SETUP missing.mjpg RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/UDP;client_port=5004\r\n\r\n";
    let resp = rtsp_request(&mut stream, req).expect("SETUP response");
    assert!(resp.starts_with("RTSP/1.0 404"), "expected 404, got: {resp}");

    server.stop();
}

#[test]
fn setup_then_play_reaches_playing() {
    let dir = std::env::temp_dir().join(format!("mjpeg-rtsp-test-{}", std::process::id() + 1));
    std::fs::create_dir_all(&dir).unwrap();
    write_fixture(&dir, "ok.mjpg");

    let bind_addr = "127.0.0.1:18602";
    let mut server = start_server(bind_addr, &dir);
    let mut stream = connect(bind_addr);

    let setup_req = "SETUP ok.mjpg RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/UDP;client_port=5004\r\n\r\n";
    let setup_resp = rtsp_request(&mut stream, setup_req).expect("SETUP response");
    assert!(setup_resp.starts_with("RTSP/1.0 200"), "SETUP: {setup_resp}");
    let session_id = session_id_of(&setup_resp).to_string();
    assert!(!session_id.is_empty());

    let play_req = format!("PLAY ok.mjpg RTSP/1.0\r\nCSeq: 2\r\nSession: {session_id}\r\n\r\n");
    let play_resp = rtsp_request(&mut stream, &play_req).expect("PLAY response");
    assert!(play_resp.starts_with("RTSP/1.0 200"), "PLAY: {play_resp}");

    let teardown_req = format!("TEARDOWN ok.mjpg RTSP/1.0\r\nCSeq: 3\r\nSession: {session_id}\r\n\r\n");
    let teardown_resp = rtsp_request(&mut stream, &teardown_req).expect("TEARDOWN response");
    assert!(teardown_resp.starts_with("RTSP/1.0 200"), "TEARDOWN: {teardown_resp}");

    server.stop();
}

#[test]
fn session_id_mismatch_is_silently_dropped() {
    let dir = std::env::temp_dir().join(format!("mjpeg-rtsp-test-{}", std::process::id() + 2));
    std::fs::create_dir_all(&dir).unwrap();
    write_fixture(&dir, "ok.mjpg");

    let bind_addr = "127.0.0.1:18603";
    let mut server = start_server(bind_addr, &dir);
    let mut stream = connect(bind_addr);

    let setup_req = "SETUP ok.mjpg RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/UDP;client_port=5006\r\n\r\n";
    let setup_resp = rtsp_request(&mut stream, setup_req).expect("SETUP response");
    assert!(setup_resp.starts_with("RTSP/1.0 200"));

    // Wrong session id on PAUSE: server must not reply at all.
    let session_id = session_id_of(&setup_resp).to_string();
    let bogus = format!(
        "PAUSE ok.mjpg RTSP/1.0\r\nCSeq: 2\r\nSession: {}\r\n\r\n",
        session_id.parse::<u32>().unwrap() ^ 1
    );
    stream.write_all(bogus.as_bytes()).unwrap();
    stream.flush().unwrap();

    stream.set_read_timeout(Some(Duration::from_millis(200))).unwrap();
    let mut probe = [0u8; 1];
    let would_block = matches!(
        stream.read(&mut probe),
        Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut
    );
    assert!(would_block, "server must not reply to a session-id-mismatched request");
    stream.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

    let good = format!("TEARDOWN ok.mjpg RTSP/1.0\r\nCSeq: 3\r\nSession: {session_id}\r\n\r\n");
    let resp = rtsp_request(&mut stream, &good).expect("TEARDOWN response");
    assert!(resp.starts_with("RTSP/1.0 200"), "expected the TEARDOWN reply: {resp}");

    server.stop();
}

#[test]
fn seek_forward_then_teardown() {
    let dir = std::env::temp_dir().join(format!("mjpeg-rtsp-test-{}", std::process::id() + 3));
    std::fs::create_dir_all(&dir).unwrap();
    write_fixture(&dir, "ok.mjpg");

    let bind_addr = "127.0.0.1:18604";
    let mut server = start_server(bind_addr, &dir);
    let mut stream = connect(bind_addr);

    let setup_req = "SETUP ok.mjpg RTSP/1.0\r\nCSeq: 1\r\nTransport: RTP/UDP;client_port=5008\r\n\r\n";
    let setup_resp = rtsp_request(&mut stream, setup_req).expect("SETUP response");
    let session_id = session_id_of(&setup_resp).to_string();

    let seek_req = format!("SEEK ok.mjpg RTSP/1.0\r\nCSeq: 2\r\nSession: {session_id}\r\nX-Frame: 1\r\n\r\n");
    let seek_resp = rtsp_request(&mut stream, &seek_req).expect("SEEK response");
    assert!(seek_resp.starts_with("RTSP/1.0 200"), "SEEK: {seek_resp}");

    let teardown_req = format!("TEARDOWN ok.mjpg RTSP/1.0\r\nCSeq: 3\r\nSession: {session_id}\r\n\r\n");
    let teardown_resp = rtsp_request(&mut stream, &teardown_req).expect("TEARDOWN response");
    assert!(teardown_resp.starts_with("RTSP/1.0 200"));

    server.stop();
}

#[test]
fn play_before_setup_is_server_error() {
    let dir = std::env::temp_dir().join(format!("mjpeg-rtsp-test-{}", std::process::id() + 4));
    std::fs::create_dir_all(&dir).unwrap();

    let bind_addr = "127.0.0.1:18605";
    let mut server = start_server(bind_addr, &dir);
    let mut stream = connect(bind_addr);

    let play_req = "PLAY ok.mjpg RTSP/1.0\r\nCSeq: 1\r\n\r\n";
    let resp = rtsp_request(&mut stream, play_req).expect("PLAY response");
    assert!(resp.starts_with("RTSP/1.0 500"), "expected 500, got: {resp}");

    server.stop();
}
