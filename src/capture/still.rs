//! Source that repeats one image

use bytes::Bytes;

use super::jpeg;
use super::FrameSource;
use crate::error::CaptureError;

/// Serves the same JPEG on every tick
#[derive(Debug, Clone)]
pub struct StillSource {
    image: Bytes,
    width: u32,
    height: u32,
}

impl StillSource {
    /// Wrap a JPEG, reading its dimensions from the frame header
    pub fn new(image: impl Into<Bytes>) -> Result<Self, CaptureError> {
        let image = image.into();
        if !jpeg::is_jpeg(&image) {
            return Err(CaptureError::NotJpeg);
        }
        let (width, height) = jpeg::dimensions(&image).unwrap_or((0, 0));

        Ok(Self {
            image,
            width,
            height,
        })
    }
}

impl FrameSource for StillSource {
    fn capture(&mut self) -> Result<Bytes, CaptureError> {
        Ok(self.image.clone())
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn name(&self) -> String {
        String::from("still")
    }
}
