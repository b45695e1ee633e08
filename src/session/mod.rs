//! Client sessions
//!
//! A session is one accepted connection. It reads a request head, routes
//! it, then resumes its response a little at a time as the socket accepts
//! data. Static file responses return the session to reading the next
//! request; every other response ends the connection.

pub mod client;
pub mod state;
pub mod stream;

pub use client::ClientSession;
pub use state::{CloseReason, Flow, SessionPhase};
pub use stream::StreamCursor;
