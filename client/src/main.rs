use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;
use mjpeg_rtsp::ClientSession;

/// Stand-in for the out-of-scope pixel UI: a line-oriented command loop
/// driving `ClientSession` and periodically printing its observable state.
#[derive(Parser)]
#[command(name = "mjpeg-rtsp-client", about = "Command-line MJPEG/RTSP streaming client")]
struct Args {
    server_ip: String,
    server_port: u16,
    rtp_port: u16,
    video_file: String,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let session = match ClientSession::connect(&args.server_ip, args.server_port, &args.video_file, args.rtp_port) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("failed to connect: {e}");
            std::process::exit(1);
        }
    };

    let stop = Arc::new(AtomicBool::new(false));
    spawn_status_ticker(Arc::clone(&session), Arc::clone(&stop));

    println!("commands: p=play a=pause s <n>=seek q=quit");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        match parts.next() {
            Some("p") => report(session.play()),
            Some("a") => report(session.pause()),
            Some("s") => match parts.next().and_then(|n| n.parse::<i64>().ok()) {
                Some(frame) => report(session.seek_frame(frame)),
                None => eprintln!("usage: s <frame>"),
            },
            Some("q") => {
                report(session.stop());
                break;
            }
            Some(other) => eprintln!("unknown command: {other}"),
            None => {}
        }
    }

    stop.store(true, Ordering::SeqCst);
}

fn report(result: mjpeg_rtsp::Result<()>) {
    if let Err(e) = result {
        eprintln!("command failed: {e}");
    }
}

fn spawn_status_ticker(session: Arc<ClientSession>, stop: Arc<AtomicBool>) {
    thread::spawn(move || {
        let mut frame = Vec::new();
        while !stop.load(Ordering::SeqCst) {
            let got = session.get_frame(&mut frame);
            let stats = session.get_stats();
            println!(
                "state={:?} buffer={}% buffering={} ended={} got_frame={} ({} bytes) packets={} lost={} frames={} dropped={}",
                session.state(),
                session.get_buffer_level(),
                session.is_buffering(),
                session.is_ended(),
                got,
                frame.len(),
                stats.packets_received,
                stats.packets_lost,
                stats.frames_received,
                stats.frames_dropped,
            );
            thread::sleep(Duration::from_millis(500));
        }
    });
}
