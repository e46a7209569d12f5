//! Error types for client operations.

use thiserror::Error;

/// Error type for client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] ironchat_transport::TransportError),

    /// Connection timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// The session has ended; no more lines can be sent.
    #[error("connection closed")]
    ConnectionClosed,

    /// The input channel is full.
    #[error("channel error")]
    Channel,

    /// Invalid configuration.
    #[error("configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },
}

impl ClientError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironchat_transport::TransportError;

    #[test]
    fn test_error_display() {
        assert_eq!(ClientError::ConnectTimeout.to_string(), "connection timeout");
        assert_eq!(
            ClientError::config("input_capacity must be at least 1").to_string(),
            "configuration error: input_capacity must be at least 1"
        );
    }

    #[test]
    fn test_from_transport() {
        let err = ClientError::from(TransportError::ConnectionClosed);
        assert!(matches!(err, ClientError::Transport(TransportError::ConnectionClosed)));
    }
}
