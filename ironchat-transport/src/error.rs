//! Error types for transport operations.

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Connection timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Line exceeds the configured maximum.
    #[error("line too long: {size} bytes exceeds maximum {max} bytes")]
    LineTooLong {
        /// Bytes buffered without finding a delimiter.
        size: usize,
        /// Maximum allowed line length.
        max: usize,
    },

    /// Outbound line cannot be framed.
    #[error("invalid line: {message}")]
    InvalidLine {
        /// Error message.
        message: String,
    },

    /// Address parse error.
    #[error("address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),

    /// Executor error.
    #[error("executor error: {message}")]
    Executor {
        /// Error message.
        message: String,
    },
}

impl TransportError {
    /// Creates a line too long error.
    pub fn line_too_long(size: usize, max: usize) -> Self {
        Self::LineTooLong { size, max }
    }

    /// Creates an invalid line error.
    pub fn invalid_line(message: impl Into<String>) -> Self {
        Self::InvalidLine {
            message: message.into(),
        }
    }

    /// Creates an executor error.
    pub fn executor(message: impl Into<String>) -> Self {
        Self::Executor {
            message: message.into(),
        }
    }

    /// Returns true if the error means the peer went away rather than
    /// something being wrong locally.
    #[must_use]
    pub fn is_disconnect(&self) -> bool {
        match self {
            Self::ConnectionClosed => true,
            Self::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::UnexpectedEof
            ),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_too_long_display() {
        let err = TransportError::line_too_long(70_000, 65_536);
        assert_eq!(
            err.to_string(),
            "line too long: 70000 bytes exceeds maximum 65536 bytes"
        );
    }

    #[test]
    fn test_is_disconnect() {
        let reset = std::io::Error::from(std::io::ErrorKind::ConnectionReset);
        assert!(TransportError::from(reset).is_disconnect());
        assert!(TransportError::ConnectionClosed.is_disconnect());
        assert!(!TransportError::ConnectTimeout.is_disconnect());
        assert!(!TransportError::invalid_line("x").is_disconnect());
    }
}
