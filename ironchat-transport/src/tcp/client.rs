//! TCP client connect.

use super::stream::TcpConnection;
use crate::error::TransportError;
use ironchat_core::DEFAULT_MAX_LINE_LENGTH;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

/// Configuration for TCP client.
#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    /// Server address to connect to.
    pub server_addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Maximum line length in bytes.
    pub max_line_length: usize,
    /// Enable TCP_NODELAY.
    pub tcp_nodelay: bool,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 3333)),
            connect_timeout: Duration::from_secs(5),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            tcp_nodelay: true,
        }
    }
}

impl TcpClientConfig {
    /// Creates a new client config with the specified server address.
    #[must_use]
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            ..Default::default()
        }
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the maximum line length.
    #[must_use]
    pub fn max_line_length(mut self, size: usize) -> Self {
        self.max_line_length = size;
        self
    }

    /// Sets TCP_NODELAY option.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

/// Connects to a server with the given configuration.
///
/// # Errors
/// Returns `TransportError` if the connection fails or times out.
pub async fn connect(config: &TcpClientConfig) -> Result<TcpConnection, TransportError> {
    let stream = tokio::time::timeout(
        config.connect_timeout,
        TcpStream::connect(config.server_addr),
    )
    .await
    .map_err(|_| TransportError::ConnectTimeout)?
    .map_err(TransportError::Io)?;

    stream.set_nodelay(config.tcp_nodelay)?;
    let peer_addr = stream.peer_addr()?;

    Ok(TcpConnection::new(
        stream,
        peer_addr,
        config.max_line_length,
    ))
}
