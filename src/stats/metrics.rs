//! Statistics for client sessions and capture sources

use std::time::{Duration, Instant};

/// Per-client counters, logged when the client disconnects
#[derive(Debug, Clone)]
pub struct SessionStats {
    /// Total bytes received
    pub bytes_received: u64,
    /// Total bytes sent
    pub bytes_sent: u64,
    /// Complete stream frames delivered
    pub frames_sent: u64,
    /// Requests fully answered on this connection
    pub requests_served: u64,
    /// Connection start time
    pub connected_at: Instant,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            bytes_received: 0,
            bytes_sent: 0,
            frames_sent: 0,
            requests_served: 0,
            connected_at: Instant::now(),
        }
    }

    /// Time since the client connected
    pub fn duration(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Average outgoing bitrate in bits per second
    pub fn send_bitrate(&self) -> u64 {
        let millis = self.duration().as_millis() as u64;
        if millis == 0 {
            return 0;
        }
        self.bytes_sent.saturating_mul(8_000) / millis
    }
}

/// Per-source capture counters
#[derive(Debug, Clone, Default)]
pub struct CaptureStats {
    /// Frames stored
    pub frames_captured: u64,
    /// Capture attempts that failed or were rejected
    pub frames_dropped: u64,
    /// Size of the last stored payload
    pub last_frame_size: usize,
}

impl CaptureStats {
    /// Record a stored frame
    pub fn record_frame(&mut self, size: usize) {
        self.frames_captured += 1;
        self.last_frame_size = size;
    }

    /// Record a failed or rejected capture
    pub fn record_drop(&mut self) {
        self.frames_dropped += 1;
    }
}
