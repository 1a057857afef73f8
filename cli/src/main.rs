use clap::Parser;
use mjpeg_rtsp::{Server, ServerConfig};
use std::io;

#[derive(Parser)]
#[command(name = "mjpeg-rtsp-server", about = "Standalone RTSP/RTP server for Motion-JPEG files")]
struct Args {
    /// Port to listen on.
    port: u16,

    /// Directory SETUP filenames are resolved against.
    #[arg(long, default_value = ".")]
    media_root: String,
}

fn main() {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    let bind_addr = format!("0.0.0.0:{}", args.port);
    let config = ServerConfig::default().with_media_root(&args.media_root);

    let mut server = Server::with_config(&bind_addr, config);
    if let Err(e) = server.start() {
        eprintln!("failed to start server: {e}");
        std::process::exit(1);
    }

    println!("RTSP server on {bind_addr}, serving {} — press Enter to stop", args.media_root);
    let mut input = String::new();
    io::stdin().read_line(&mut input).ok();

    server.stop();
}
