//! Prelude module for convenient imports.
//!
//! ```ignore
//! use ironchat::prelude::*;
//! ```

// Core types
pub use ironchat_core::{ChatLine, ConnectionId, CoreError, EXIT_SENTINEL, Inbound};

// Transport types
pub use ironchat_transport::{Executor, TransportError};

// Server types
pub use ironchat_server::{
    ConnectionState, Registry, Server, ServerBuilder, ServerError, ServerEvent, ServerHandle,
    SessionManager,
};

// Client types
pub use ironchat_client::{Client, ClientBuilder, ClientError, ClientEvent, ClientHandle};
