//! Frame capture
//!
//! A [`FrameSource`] yields one JPEG per capture tick. The server owns its
//! sources and polls each once per tick, storing the result in the frame
//! store of the same index.

pub mod channel;
pub mod jpeg;
pub mod sequence;
pub mod still;

use bytes::Bytes;

use crate::error::CaptureError;

pub use channel::ChannelSource;
pub use sequence::ImageSequenceSource;
pub use still::StillSource;

/// Producer of JPEG frames
pub trait FrameSource: Send {
    /// Produce the next JPEG
    ///
    /// [`CaptureError::NoFrame`] means nothing was ready this tick; the store
    /// is left as it is.
    fn capture(&mut self) -> Result<Bytes, CaptureError>;

    /// Frame width in pixels, 0 if unknown
    fn width(&self) -> u32;

    /// Frame height in pixels, 0 if unknown
    fn height(&self) -> u32;

    /// Name used in logs
    fn name(&self) -> String {
        String::from("capture")
    }
}
