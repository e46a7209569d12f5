//! # IronChat Core
//!
//! Protocol vocabulary shared by the IronChat server and client.
//!
//! This crate provides:
//! - [`line`] - Line delimiter, termination sentinel and inbound line classification
//! - [`message`] - Broadcast line formatting (`"<name>: <text>\n"`)
//! - [`types`] - Identifiers shared across crates
//! - [`error`] - Error types for protocol helpers

pub mod error;
pub mod line;
pub mod message;
pub mod types;

pub use error::{CoreError, Result};
pub use line::{DELIMITER, DEFAULT_MAX_LINE_LENGTH, EXIT_SENTINEL, Inbound};
pub use message::ChatLine;
pub use types::ConnectionId;
