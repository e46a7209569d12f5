//! Accepted or connected TCP streams and their framed halves.

use super::codec::LineCodec;
use crate::error::TransportError;
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

/// Read half of a connection yielding one line per item.
pub type LineReader = FramedRead<OwnedReadHalf, LineCodec>;

/// Write half of a connection accepting `&str`, `String` or pre-encoded `Bytes` frames.
pub type LineWriter = FramedWrite<OwnedWriteHalf, LineCodec>;

/// A TCP connection to a peer, not yet split.
#[derive(Debug)]
pub struct TcpConnection {
    stream: TcpStream,
    peer_addr: SocketAddr,
    max_line_length: usize,
}

impl TcpConnection {
    pub(crate) fn new(stream: TcpStream, peer_addr: SocketAddr, max_line_length: usize) -> Self {
        Self {
            stream,
            peer_addr,
            max_line_length,
        }
    }

    /// Returns the peer address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Returns the local address.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.stream.local_addr()
    }

    /// Splits the connection into independently owned framed halves, so one
    /// task can read while another writes.
    #[must_use]
    pub fn into_split(self) -> (LineReader, LineWriter) {
        let (read, write) = self.stream.into_split();
        (
            FramedRead::new(read, LineCodec::new(self.max_line_length)),
            FramedWrite::new(write, LineCodec::new(self.max_line_length)),
        )
    }
}

/// Shuts the write direction down immediately.
///
/// Bytes still sitting in the framed write buffer are not flushed. The peer
/// observes end-of-stream; the socket is closed once both halves are dropped.
///
/// # Errors
/// Returns `TransportError` if the shutdown call fails, e.g. because the
/// peer already reset the connection.
pub async fn shutdown_writer(writer: &mut LineWriter) -> Result<(), TransportError> {
    writer.get_mut().shutdown().await.map_err(TransportError::Io)
}
