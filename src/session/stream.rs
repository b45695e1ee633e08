//! Position of a session inside a frame store
//!
//! A cursor names a frame by sequence plus a byte offset into its wrapped
//! bytes. Streams always aim for the newest frame: a cursor whose frame was
//! overwritten jumps forward, and a finished frame moves the cursor to the
//! newest one once it differs. Frames in between are skipped.

use bytes::Bytes;

use crate::registry::FrameStore;

/// Read position for one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    /// Source index in the registry
    pub source: usize,
    /// Frame being sent
    pub sequence: u64,
    /// Bytes of that frame already sent
    pub offset: usize,
}

impl StreamCursor {
    /// Bind to the newest frame of `store`, or sequence 0 if it is empty
    pub fn bind(source: usize, store: &FrameStore) -> Self {
        Self {
            source,
            sequence: store.newest().unwrap_or(0),
            offset: 0,
        }
    }

    /// Unsent bytes of the current wrapped frame
    ///
    /// A stale cursor catches up to the newest frame first. Returns `None`
    /// when the store has nothing to send yet.
    pub fn remaining(&mut self, store: &FrameStore) -> Option<Bytes> {
        if store.get(self.sequence).is_none() {
            let newest = store.newest()?;
            tracing::trace!(
                from = self.sequence,
                to = newest,
                "Stream cursor caught up"
            );
            self.sequence = newest;
            self.offset = 0;
        }

        let frame = store.get(self.sequence)?;
        let start = self.offset.min(frame.len());
        Some(frame.data().slice(start..))
    }

    /// Record `written` bytes sent from [`remaining`](Self::remaining)
    ///
    /// Returns true when this write completed the frame. A completed frame
    /// moves the cursor to the newest frame if a newer one exists.
    pub fn advance(&mut self, written: usize, store: &FrameStore) -> bool {
        let Some(frame) = store.get(self.sequence) else {
            return false;
        };

        self.offset = (self.offset + written).min(frame.len());
        let finished = self.offset == frame.len();

        if finished {
            if let Some(newest) = store.newest() {
                if self.sequence < newest {
                    self.sequence = newest;
                    self.offset = 0;
                }
            }
        }

        finished && written > 0
    }

    /// Whether a write attempt would send anything
    pub fn has_pending(&self, store: &FrameStore) -> bool {
        let Some(newest) = store.newest() else {
            return false;
        };
        match store.get(self.sequence) {
            Some(frame) => self.offset < frame.len() || self.sequence < newest,
            // Stale, catch-up will find the newest frame
            None => true,
        }
    }

    /// Unsent bytes of the bound frame's JPEG payload, without catching up
    ///
    /// Used for stills: `None` means the frame is gone or never existed.
    pub fn remaining_payload(&self, store: &FrameStore) -> Option<Bytes> {
        let payload = store.get(self.sequence)?.payload();
        let start = self.offset.min(payload.len());
        Some(payload.slice(start..))
    }
}
