//! HTTP server
//!
//! Listeners, client transport, routing and the multiplexer loop that ties
//! them to the frame stores.

pub mod config;
pub mod connection;
pub mod listener;
pub mod router;
pub mod tls;

pub use config::{ServerConfig, TlsConfig};
pub use connection::Connection;
pub use listener::Server;
pub use router::{Route, RouteKind, Router};
