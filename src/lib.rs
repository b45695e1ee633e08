//! Multi-source MJPEG streaming server
//!
//! Serves live `multipart/x-mixed-replace` JPEG streams, single stills and
//! a small static web root over HTTP or HTTPS. A single task multiplexes
//! every client with non-blocking sockets, so a slow client only ever
//! costs its own partial writes.
//!
//! ```text
//! FrameSource ──capture tick──> FrameStore ring ──> ClientSession cursor ──> socket
//! ```
//!
//! # Routes
//!
//! | Path            | Response                                  |
//! |-----------------|-------------------------------------------|
//! | `/stream/info`  | JSON with source count and dimensions     |
//! | `/stream/<n>`   | Live MJPEG stream from source `n`         |
//! | `/still/<n>`    | Latest JPEG from source `n`               |
//! | anything else   | File below the static root, keep-alive    |
//!
//! # Example
//!
//! ```no_run
//! use hawkeye_rs::capture::{FrameSource, ImageSequenceSource};
//! use hawkeye_rs::{Server, ServerConfig};
//!
//! # async fn run() -> hawkeye_rs::Result<()> {
//! let source = ImageSequenceSource::open("frames")?;
//! let config = ServerConfig::with_addr("0.0.0.0", 8000).fps(10);
//!
//! let mut server = Server::bind(config, vec![Box::new(source) as Box<dyn FrameSource>]).await?;
//! server
//!     .run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await
//! # }
//! ```

pub mod capture;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod stats;

pub use capture::FrameSource;
pub use error::{CaptureError, Error, Result, TlsError};
pub use registry::{Frame, FrameStore, SourceRegistry};
pub use server::{Server, ServerConfig, TlsConfig};
