//! Session state machine
//!
//! ```text
//! AwaitingHeaders ──route──> Draining(kind) ──┬──> Streaming      (stream)
//!        ^                                    ├──> Closed         (canned, still)
//!        └────────── static file EOF ─────────┘
//! ```

use crate::server::router::RouteKind;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Accumulating the request head
    AwaitingHeaders,
    /// Writing the response head, and the body for files and stills
    Draining(RouteKind),
    /// Response head sent, pushing frames as they arrive
    Streaming,
    /// Finished; the multiplexer removes the session
    Closed,
}

impl SessionPhase {
    /// Whether the session should be polled for readability
    pub fn wants_read(&self) -> bool {
        matches!(self, SessionPhase::AwaitingHeaders)
    }
}

/// Result of driving a session for one readiness event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep the session
    Continue,
    /// Remove and close the session
    Close(CloseReason),
}

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Peer closed its end
    PeerClosed,
    /// Read or write failed
    IoError,
    /// One-shot response fully sent
    ResponseComplete,
    /// Still frame gone before it was sent
    FrameUnavailable,
    /// No activity within the keep-alive window
    Timeout,
    /// Server shutting down
    Shutdown,
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CloseReason::PeerClosed => "peer closed connection",
            CloseReason::IoError => "socket error",
            CloseReason::ResponseComplete => "response complete",
            CloseReason::FrameUnavailable => "frame unavailable",
            CloseReason::Timeout => "timed out",
            CloseReason::Shutdown => "server shutdown",
        };
        f.write_str(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_interest() {
        assert!(SessionPhase::AwaitingHeaders.wants_read());
        assert!(!SessionPhase::Streaming.wants_read());
        assert!(!SessionPhase::Draining(RouteKind::StaticFile).wants_read());
        assert!(!SessionPhase::Closed.wants_read());
    }

    #[test]
    fn test_close_reason_display() {
        assert_eq!(CloseReason::Timeout.to_string(), "timed out");
    }
}
