//! TCP listener.

use super::stream::TcpConnection;
use crate::error::TransportError;
use ironchat_core::DEFAULT_MAX_LINE_LENGTH;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use tokio::net::TcpListener;

/// Configuration for TCP server.
#[derive(Debug, Clone)]
pub struct TcpServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Maximum line length in bytes.
    pub max_line_length: usize,
    /// Enable TCP_NODELAY on accepted connections.
    pub tcp_nodelay: bool,
    /// Listen backlog.
    pub backlog: i32,
}

impl Default for TcpServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3333)),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            tcp_nodelay: true,
            backlog: 1024,
        }
    }
}

impl TcpServerConfig {
    /// Creates a new server config with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
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

    /// Sets the listen backlog.
    #[must_use]
    pub fn backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }
}

/// Bound, listening TCP endpoint.
///
/// Dropping the server closes the listening socket.
#[derive(Debug)]
pub struct TcpServer {
    listener: TcpListener,
    config: TcpServerConfig,
}

impl TcpServer {
    /// Binds to the configured address and starts listening.
    ///
    /// Must be called from within a Tokio runtime context.
    ///
    /// # Errors
    /// Returns IO error if the socket cannot be created, bound or put in
    /// listening mode.
    pub fn bind(config: TcpServerConfig) -> std::io::Result<Self> {
        let listener = bind_listener(config.bind_addr, config.backlog)?;
        Ok(Self { listener, config })
    }

    /// Accepts a new connection.
    ///
    /// # Errors
    /// Returns `TransportError` if accept fails or the accepted socket cannot
    /// be configured.
    pub async fn accept(&self) -> Result<TcpConnection, TransportError> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(self.config.tcp_nodelay)?;

        Ok(TcpConnection::new(
            stream,
            addr,
            self.config.max_line_length,
        ))
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &TcpServerConfig {
        &self.config
    }
}

fn bind_listener(addr: SocketAddr, backlog: i32) -> std::io::Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    // Restarted servers must be able to rebind while old sockets sit in TIME_WAIT
    #[cfg(unix)]
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    TcpListener::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{SinkExt, StreamExt};

    #[test]
    fn test_tcp_server_config_default() {
        let config = TcpServerConfig::default();
        assert_eq!(config.bind_addr.port(), 3333);
        assert_eq!(config.max_line_length, DEFAULT_MAX_LINE_LENGTH);
        assert!(config.tcp_nodelay);
        assert_eq!(config.backlog, 1024);
    }

    #[test]
    fn test_tcp_server_config_builder() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = TcpServerConfig::new(addr)
            .max_line_length(128)
            .tcp_nodelay(false)
            .backlog(16);

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.max_line_length, 128);
        assert!(!config.tcp_nodelay);
        assert_eq!(config.backlog, 16);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = TcpServer::bind(TcpServerConfig::new("127.0.0.1:0".parse().unwrap())).unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_bind_port_in_use_fails() {
        let first = TcpServer::bind(TcpServerConfig::new("127.0.0.1:0".parse().unwrap())).unwrap();
        let taken = first.local_addr().unwrap();

        assert!(TcpServer::bind(TcpServerConfig::new(taken)).is_err());
    }

    #[tokio::test]
    async fn test_accept_and_exchange_lines() {
        let server = TcpServer::bind(TcpServerConfig::new("127.0.0.1:0".parse().unwrap())).unwrap();
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            let peer = stream.peer_addr().unwrap();
            let (mut reader, mut writer) = TcpConnection::new(stream, peer, 1024).into_split();
            writer.send("alice").await.unwrap();
            reader.next().await.unwrap().unwrap()
        });

        let conn = server.accept().await.unwrap();
        assert!(conn.peer_addr().ip().is_loopback());
        let (mut reader, mut writer) = conn.into_split();
        assert_eq!(reader.next().await.unwrap().unwrap(), "alice");
        writer
            .send(bytes::Bytes::from_static(b"bob: hi\n"))
            .await
            .unwrap();

        assert_eq!(client.await.unwrap(), "bob: hi");
    }
}
