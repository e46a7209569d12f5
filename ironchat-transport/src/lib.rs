//! # IronChat Transport
//!
//! Network transport layer for line-oriented chat.
//!
//! This crate provides:
//! - [`tcp`] - TCP listener, connections and client connect, framed by a line codec
//! - [`executor`] - The multi-threaded reactor every engine callback runs on

pub mod error;
pub mod executor;
pub mod tcp;

pub use error::TransportError;
pub use executor::Executor;
