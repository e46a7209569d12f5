//! # IronChat Channel
//!
//! Channel abstractions used between IronChat components.
//!
//! This crate provides:
//! - [`events`] - Bounded, lossy event channels from the engine to an observer
//! - [`outbound`] - Per-connection outbound queues drained by a single writer

pub mod events;
pub mod outbound;

pub use events::{EventReceiver, EventSender};
pub use outbound::{OutboundReceiver, OutboundSender};

/// Error type for channel operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelError<T> {
    /// Channel is full, item returned.
    Full(T),
    /// Channel is disconnected, item returned.
    Disconnected(T),
}

impl<T> ChannelError<T> {
    /// Returns the item that could not be delivered.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(item) | Self::Disconnected(item) => item,
        }
    }

    /// Returns true if the other side is gone.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected(_))
    }
}

impl<T> std::fmt::Display for ChannelError<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full(_) => write!(f, "channel full"),
            Self::Disconnected(_) => write!(f, "channel disconnected"),
        }
    }
}

impl<T: std::fmt::Debug> std::error::Error for ChannelError<T> {}
