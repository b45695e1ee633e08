//! Stored frame type
//!
//! A frame is one JPEG wrapped as a complete multipart part: the part header,
//! the image bytes and the boundary that closes the part.

use bytes::{BufMut, Bytes, BytesMut};

use crate::protocol::constants::{FRAME_FOOTER, FRAME_HEADER};

/// A ready-to-send multipart chunk
///
/// Cheap to clone: the data is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Sequence number assigned at insertion
    sequence: u64,
    /// Header + payload + footer
    data: Bytes,
}

impl Frame {
    /// Wrap a JPEG payload with the multipart part header and footer
    pub fn wrap(sequence: u64, payload: &[u8]) -> Self {
        let mut buf = BytesMut::with_capacity(Self::wrapped_len(payload.len()));
        buf.put_slice(FRAME_HEADER.as_bytes());
        buf.put_slice(payload);
        buf.put_slice(FRAME_FOOTER.as_bytes());

        Self {
            sequence,
            data: buf.freeze(),
        }
    }

    /// Total size of a wrapped frame for a payload of `payload_len` bytes
    pub fn wrapped_len(payload_len: usize) -> usize {
        FRAME_HEADER.len() + payload_len + FRAME_FOOTER.len()
    }

    /// Sequence number of this frame
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// The full multipart chunk
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Length of the full multipart chunk
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always false: even an empty payload carries header and footer
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The JPEG payload without header and footer (zero-copy slice)
    pub fn payload(&self) -> Bytes {
        self.data
            .slice(FRAME_HEADER.len()..self.data.len() - FRAME_FOOTER.len())
    }
}
