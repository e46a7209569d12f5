//! # IronChat Server
//!
//! Server-side engine for line-oriented chat.
//!
//! This crate provides:
//! - Server builder with configuration options
//! - The name registry used for broadcast routing
//! - The connection table owning per-connection bookkeeping
//! - The per-connection read/respond state machine
//! - Connection acceptor

mod acceptor;
pub mod builder;
mod connection;
pub mod error;
pub mod registry;
pub mod session;

pub use builder::{Server, ServerBuilder, ServerEvent, ServerHandle};
pub use connection::{ConnectionState, Peer};
pub use error::ServerError;
pub use ironchat_core::ConnectionId;
pub use registry::Registry;
pub use session::{Session, SessionManager};
