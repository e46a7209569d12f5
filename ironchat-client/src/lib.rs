//! # IronChat Client
//!
//! Client-side engine for line-oriented chat.
//!
//! This crate provides:
//! - Client builder with configuration options
//! - A duplex session: one task printing inbound lines, one task writing
//!   input lines, running independently on the same executor
//! - Blocking input bridging from any `BufRead` source

pub mod builder;
pub mod error;
mod session;

pub use builder::{Client, ClientBuilder, ClientEvent, ClientHandle};
pub use error::ClientError;
