//! HTTP wire protocol
//!
//! This module provides:
//! - Request head parsing (request line, `Host`, `Authorization`)
//! - Byte-exact response heads and canned bodies
//! - Basic authorization checks
//! - The extension to MIME type table

pub mod auth;
pub mod constants;
pub mod mime;
pub mod request;
pub mod response;

pub use auth::{check_basic_auth, encode_secret};
pub use mime::mime_type;
pub use request::{find_head_end, Request};
pub use response::{ResponseHead, Status};
