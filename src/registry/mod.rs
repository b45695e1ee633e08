//! Frame stores for captured video
//!
//! Each capture source owns one fixed-capacity ring of ready-to-send
//! multipart chunks. Sessions never hold frames; they hold a source index
//! and a sequence number, and look the frame up again on every write.
//!
//! # Architecture
//!
//! ```text
//!                          SourceRegistry
//!                     ┌─────────────────────────┐
//!                     │ stores: [FrameStore; n] │
//!                     │   slot = seq % capacity │
//!                     └───────────┬─────────────┘
//!                                 │
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Capture]               [Session]               [Session]
//!    push(jpeg)              get(cursor)             get(cursor)
//!         │                       │                       │
//!         └──► FrameStore ────────► write(frame[pos..]) ──► TCP
//! ```
//!
//! # Zero-Copy Design
//!
//! Frames are stored as `bytes::Bytes`, already wrapped in the multipart
//! part header and boundary footer, so streaming sessions write straight out
//! of the ring and still-image sessions slice the payload without copying.

pub mod error;
pub mod frame;
pub mod sources;
pub mod store;

pub use error::PushError;
pub use frame::Frame;
pub use sources::SourceRegistry;
pub use store::FrameStore;
