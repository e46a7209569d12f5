//! # IronChat
//!
//! Multi-threaded TCP line chat for Rust.
//!
//! A server accepts any number of clients. Each client's first line is its
//! display name; every later line is relayed to all other registered
//! clients as `"<name>: <line>"`, and `EXIT` ends the session. A client
//! runs a duplex session: inbound lines are reported while input lines are
//! written, independently.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ironchat::prelude::*;
//!
//! let (mut server, handle) = ServerBuilder::new()
//!     .bind("0.0.0.0:3333".parse().unwrap())
//!     .worker_threads(3)
//!     .build();
//! let addr = server.start()?;
//!
//! let (client, chat) = ClientBuilder::new(addr).connect()?;
//! chat.send("alice")?;
//! chat.send("hello everyone")?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Line rules, the exit sentinel, broadcast formatting
//! - [`channel`] - Observer event channels and per-connection outbound queues
//! - [`transport`] - TCP transport, line codec and the executor
//! - [`server`] - Server-side engine
//! - [`client`] - Client-side engine

pub mod prelude;

/// Protocol vocabulary shared by server and client.
pub mod core {
    pub use ironchat_core::*;
}

/// Channel implementations.
pub mod channel {
    pub use ironchat_channel::*;
}

/// Network transport layer.
pub mod transport {
    pub use ironchat_transport::*;
}

/// Server-side engine.
pub mod server {
    pub use ironchat_server::*;
}

/// Client-side engine.
pub mod client {
    pub use ironchat_client::*;
}
