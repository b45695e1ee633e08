//! Source fed from another task or thread
//!
//! Cameras and encoders usually run on their own thread. They send finished
//! JPEGs through the [`FrameSender`]; each capture tick keeps only the most
//! recent one.

use bytes::Bytes;
use tokio::sync::mpsc;

use super::FrameSource;
use crate::error::CaptureError;

/// Sending half handed to the producer
pub type FrameSender = mpsc::Sender<Bytes>;

/// Receives frames produced elsewhere
#[derive(Debug)]
pub struct ChannelSource {
    rx: mpsc::Receiver<Bytes>,
    width: u32,
    height: u32,
}

impl ChannelSource {
    /// Create a source and the sender that feeds it
    ///
    /// `capacity` bounds how many frames may queue between ticks.
    pub fn new(capacity: usize, width: u32, height: u32) -> (FrameSender, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self { rx, width, height })
    }
}

impl FrameSource for ChannelSource {
    fn capture(&mut self) -> Result<Bytes, CaptureError> {
        let mut latest = None;
        loop {
            match self.rx.try_recv() {
                Ok(frame) => latest = Some(frame),
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => {
                    if latest.is_none() {
                        return Err(CaptureError::Io(std::io::Error::new(
                            std::io::ErrorKind::BrokenPipe,
                            "frame producer went away",
                        )));
                    }
                    break;
                }
            }
        }
        latest.ok_or(CaptureError::NoFrame)
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn name(&self) -> String {
        String::from("channel")
    }
}
