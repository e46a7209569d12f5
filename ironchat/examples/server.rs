//! Chat server: relays every line of a registered client to all others.
//!
//! Run with: `cargo run --example server -- --port 3333`
//!
//! Connect with `cargo run --example client` or any line-based TCP tool.

use anyhow::Result;
use clap::Parser;
use ironchat::server::ServerBuilder;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "ironchat-server", about = "TCP line chat server")]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    bind: IpAddr,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 3333)]
    port: u16,

    /// Executor worker threads.
    #[arg(short, long, default_value_t = 3)]
    workers: usize,

    /// Stop after this many seconds instead of waiting for Ctrl+C.
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Maximum simultaneous connections.
    #[arg(long)]
    max_connections: Option<usize>,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

/// Resolves once Ctrl+C is pressed or `duration` has elapsed.
fn wait_for_stop(duration: Option<Duration>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match duration {
            Some(duration) => tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                () = tokio::time::sleep(duration) => {}
            },
            None => {
                tokio::signal::ctrl_c().await.ok();
            }
        }
    });
    Ok(())
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut builder = ServerBuilder::new()
        .bind(SocketAddr::new(args.bind, args.port))
        .worker_threads(args.workers);
    if let Some(max) = args.max_connections {
        builder = builder.max_connections(max);
    }
    let (mut server, handle) = builder.build();

    let addr = match server.start() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Server failed to start: {}", e);
            std::process::exit(e.exit_code());
        }
    };
    println!("IronChat server listening on {addr}");
    println!("Press Ctrl+C to stop");

    wait_for_stop(args.duration_secs.map(Duration::from_secs))?;

    println!("\nShutting down server...");
    server.stop();
    println!(
        "Server stopped ({} events dropped)",
        handle.dropped_events()
    );
    Ok(())
}
