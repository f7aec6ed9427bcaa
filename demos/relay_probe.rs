//! Relay probe: connect to a capture process stream and report frames
//!
//! Run with: cargo run --example relay_probe [PORT] [USER:PASS] [AUTH_LEVEL]
//!
//! Examples:
//!   cargo run --example relay_probe                      # 127.0.0.1:8081, no auth
//!   cargo run --example relay_probe 8082                 # 127.0.0.1:8082
//!   cargo run --example relay_probe 8081 admin:secret 1  # basic auth
//!   cargo run --example relay_probe 8081 admin:secret 2  # digest auth
//!
//! Prints the frame size and frame rate once a second until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use mjpg_relay::capture::{CameraConfig, StaticCameras, UnmanagedCapture};
use mjpg_relay::{CameraId, RelaySupervisor, SupervisorConfig};

const CAMERA: CameraId = CameraId(1);

fn print_usage() {
    eprintln!("Usage: relay_probe [PORT] [USER:PASS] [AUTH_LEVEL]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  PORT         Stream port of the capture process (default: 8081)");
    eprintln!("  USER:PASS    Stream credentials (default: none)");
    eprintln!("  AUTH_LEVEL   0 = none, 1 = basic, 2 = digest (default: 1 with credentials)");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let port = match args.get(1) {
        Some(port) => match port.parse::<u16>() {
            Ok(port) => port,
            Err(_) => {
                eprintln!("Error: invalid port '{}'", port);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => 8081,
    };
    let authentication = args.get(2).cloned().unwrap_or_default();
    let level = match args.get(3) {
        Some(level) => level.parse::<u8>()?,
        None if authentication.is_empty() => 0,
        None => 1,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mjpg_relay=debug".parse()?)
                .add_directive("relay_probe=debug".parse()?),
        )
        .init();

    let cameras = StaticCameras::new().with_camera(
        CAMERA,
        CameraConfig::local(port).with_auth(level, authentication),
    );
    let supervisor = Arc::new(RelaySupervisor::new(
        SupervisorConfig::default(),
        Arc::new(cameras),
        Arc::new(UnmanagedCapture),
    ));
    let sweep = supervisor.start();

    println!("Probing mjpg stream on 127.0.0.1:{} (auth level {})", port, level);

    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // Polling keeps the connection from going idle
                match supervisor.get_frame(CAMERA) {
                    Some(jpeg) => println!(
                        "frame: {} bytes, {:.2} fps",
                        jpeg.len(),
                        supervisor.get_fps(CAMERA)
                    ),
                    None => println!("no frame yet"),
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                break;
            }
        }
    }

    sweep.abort();
    supervisor.close_all(true);

    let stats = supervisor.supervisor_stats();
    println!(
        "Stats: connections={} erroneous_closes={} restarts={}",
        stats.total_connections, stats.erroneous_closes, stats.restarts
    );
    Ok(())
}
