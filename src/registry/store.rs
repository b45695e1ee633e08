//! Fixed-capacity frame ring
//!
//! The slot for sequence `s` is `s % capacity`. A sequence is retrievable
//! while it is one of the last `capacity` insertions; anything older has
//! been overwritten and reads as stale.

use super::error::PushError;
use super::frame::Frame;
use crate::protocol::constants::{DEFAULT_FRAME_BUFFER_LEN, MAX_FRAME_SIZE};

/// Circular buffer of wrapped frames for one video source
///
/// One writer (the capture tick) and any number of readers (sessions). All
/// access happens on the multiplexer task, so no locking is needed.
#[derive(Debug)]
pub struct FrameStore {
    /// Slot array, `None` until first written
    frames: Vec<Option<Frame>>,
    /// Sequence number the next push will receive
    next_sequence: u64,
    /// Maximum accepted payload size in bytes
    max_frame_size: usize,
}

impl FrameStore {
    /// Create a store holding the last `capacity` frames
    pub fn new(capacity: usize) -> Self {
        Self::with_max_frame_size(capacity, MAX_FRAME_SIZE)
    }

    /// Create a store with a custom payload limit
    pub fn with_max_frame_size(capacity: usize, max_frame_size: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: vec![None; capacity],
            next_sequence: 0,
            max_frame_size,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.frames.len()
    }

    /// Maximum accepted payload size
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Whether no frame has been stored yet
    pub fn is_empty(&self) -> bool {
        self.next_sequence == 0
    }

    /// Sequence of the most recent frame, `None` before the first push
    pub fn newest(&self) -> Option<u64> {
        self.next_sequence.checked_sub(1)
    }

    /// Wrap and store a JPEG payload
    ///
    /// Returns the sequence assigned to the frame. Oversized payloads are
    /// rejected and leave the store untouched.
    pub fn push(&mut self, payload: &[u8]) -> Result<u64, PushError> {
        if payload.len() > self.max_frame_size {
            return Err(PushError::FrameTooLarge {
                size: Frame::wrapped_len(payload.len()),
                max: self.max_frame_size,
            });
        }

        let sequence = self.next_sequence;
        let slot = self.slot(sequence);
        self.frames[slot] = Some(Frame::wrap(sequence, payload));
        self.next_sequence += 1;

        Ok(sequence)
    }

    /// Look up a frame by sequence
    ///
    /// Returns `None` when `sequence` has been evicted (older than the last
    /// `capacity` frames) or its slot was never written. A sequence newer
    /// than [`newest`](Self::newest) is not detected here: the slot's current
    /// occupant is returned, so callers must only ask for sequences they have
    /// seen via `newest`.
    pub fn get(&self, sequence: u64) -> Option<&Frame> {
        let newest = self.newest()?;
        if sequence.saturating_add(self.capacity() as u64) <= newest {
            return None;
        }
        self.frames[self.slot(sequence)].as_ref()
    }

    /// Whether `sequence` has fallen out of the window
    pub fn is_stale(&self, sequence: u64) -> bool {
        self.get(sequence).is_none()
    }

    fn slot(&self, sequence: u64) -> usize {
        (sequence % self.capacity() as u64) as usize
    }
}

impl Default for FrameStore {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_BUFFER_LEN)
    }
}
