//! Frame store error types

/// Error returned when a frame cannot be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// Payload exceeds the store's maximum frame size
    FrameTooLarge {
        /// Size of the wrapped frame in bytes
        size: usize,
        /// Maximum payload size accepted by the store
        max: usize,
    },
    /// Source index does not exist
    UnknownSource(usize),
}

impl std::fmt::Display for PushError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PushError::FrameTooLarge { size, max } => write!(
                f,
                "Frame is larger than the maximum frame size: data_len = {} (max {})",
                size, max
            ),
            PushError::UnknownSource(index) => write!(f, "Unknown video source: {}", index),
        }
    }
}

impl std::error::Error for PushError {}
