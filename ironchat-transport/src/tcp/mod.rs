//! TCP transport module.
//!
//! Provides the TCP listener and client connect, framed by [`LineCodec`].

pub mod client;
pub mod codec;
pub mod server;
pub mod stream;

pub use client::{TcpClientConfig, connect};
pub use codec::LineCodec;
pub use server::{TcpServer, TcpServerConfig};
pub use stream::{LineReader, LineWriter, TcpConnection, shutdown_writer};
