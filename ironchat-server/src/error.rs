//! Error types for server operations.

use std::net::SocketAddr;
use thiserror::Error;

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] ironchat_transport::TransportError),

    /// The listening endpoint could not be set up.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Requested bind address.
        addr: SocketAddr,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// `start` called on a running server.
    #[error("server already started")]
    AlreadyStarted,

    /// Server shutdown.
    #[error("server shutdown")]
    Shutdown,
}

impl ServerError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns a non-zero process exit status derived from the underlying
    /// OS error, or 1 when there is none.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        let io = match self {
            Self::Io(e) | Self::Bind { source: e, .. } => Some(e),
            Self::Transport(ironchat_transport::TransportError::Io(e)) => Some(e),
            _ => None,
        };
        io.and_then(std::io::Error::raw_os_error)
            .filter(|code| *code != 0)
            .unwrap_or(1)
    }
}
