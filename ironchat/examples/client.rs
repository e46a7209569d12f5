//! Chat client: sends stdin line by line and prints whatever the server
//! relays. The first line is your display name; `EXIT` leaves.
//!
//! Run with: `cargo run --example client -- --host 127.0.0.1 --port 3333`
//!
//! Make sure the server is running first: `cargo run --example server`

use anyhow::{Context, Result};
use clap::Parser;
use ironchat::client::{ClientBuilder, ClientEvent};
use std::io::BufReader;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

#[derive(Debug, Parser)]
#[command(name = "ironchat-client", about = "TCP line chat client")]
struct Args {
    /// Server address.
    #[arg(long, default_value = "127.0.0.1")]
    host: IpAddr,

    /// Server port.
    #[arg(short, long, default_value_t = 3333)]
    port: u16,

    /// Executor worker threads.
    #[arg(short, long, default_value_t = 5)]
    workers: usize,

    /// Connection timeout in seconds.
    #[arg(long, default_value_t = 5)]
    connect_timeout_secs: u64,
}

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let addr = SocketAddr::new(args.host, args.port);

    let (mut client, handle) = ClientBuilder::new(addr)
        .worker_threads(args.workers)
        .connect_timeout(Duration::from_secs(args.connect_timeout_secs))
        .connect()
        .with_context(|| format!("failed to connect to {addr}"))?;

    eprintln!("Connected to {addr}. Type your name, then chat. EXIT leaves.");
    handle
        .spawn_input(BufReader::new(std::io::stdin()))
        .context("failed to start input thread")?;

    loop {
        match handle.recv_timeout(Duration::from_millis(100)) {
            Some(ClientEvent::Message(line)) => println!("{line}"),
            Some(ClientEvent::Error(e)) => eprintln!("[error] {e}"),
            Some(ClientEvent::Disconnected) => {
                eprintln!("Disconnected");
                break;
            }
            Some(ClientEvent::Connected) => {}
            // The write loop ends on EXIT; wait for the server to close
            None if handle.is_closed() && !client.is_connected() => break,
            None => {}
        }
    }

    client.shutdown(Duration::from_secs(1));
    Ok(())
}
