//! Error types for protocol helpers.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error type for protocol helpers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// A field that ends up on the wire contains the line delimiter.
    #[error("{field} contains the line delimiter")]
    EmbeddedDelimiter {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A field that must carry content is empty.
    #[error("{field} is empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },
}

impl CoreError {
    /// Creates an embedded delimiter error.
    pub fn embedded_delimiter(field: &'static str) -> Self {
        Self::EmbeddedDelimiter { field }
    }

    /// Creates an empty field error.
    pub fn empty(field: &'static str) -> Self {
        Self::Empty { field }
    }
}
