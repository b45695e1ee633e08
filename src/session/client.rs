//! Per-client session
//!
//! Owns the transport and everything needed to resume a partial response on
//! the next tick: the request head gathered so far, the response head and
//! how much of it went out, the open file for static responses and the
//! stream cursor for live video. Every read and write is a single
//! non-blocking attempt; a short write just moves the offsets.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use bytes::Bytes;

use super::state::{CloseReason, Flow, SessionPhase};
use super::stream::StreamCursor;
use crate::protocol::response;
use crate::protocol::{find_head_end, Request};
use crate::registry::SourceRegistry;
use crate::server::router::{Route, RouteKind, Router};
use crate::stats::SessionStats;

/// State of one connected client
#[derive(Debug)]
pub struct ClientSession<T> {
    id: u64,
    peer_addr: SocketAddr,
    transport: T,
    phase: SessionPhase,

    /// Request head gathered so far
    request: Vec<u8>,
    /// Longest accepted request head
    header_limit: usize,

    /// Response head (and body for canned responses)
    response: Bytes,
    /// Bytes of `response` already written
    response_pos: usize,

    /// Frame position for streams and stills
    cursor: Option<StreamCursor>,
    /// Open file for static responses
    file: Option<File>,
    /// Read buffer, sized to the largest single write
    scratch: Box<[u8]>,

    last_activity: Instant,
    stats: SessionStats,
}

impl<T: Read + Write> ClientSession<T> {
    /// Create a session waiting for its first request
    pub fn new(
        id: u64,
        peer_addr: SocketAddr,
        transport: T,
        header_limit: usize,
        chunk_size: usize,
    ) -> Self {
        Self {
            id,
            peer_addr,
            transport,
            phase: SessionPhase::AwaitingHeaders,
            request: Vec::with_capacity(header_limit.min(1024)),
            header_limit: header_limit.max(4),
            response: Bytes::new(),
            response_pos: 0,
            cursor: None,
            file: None,
            scratch: vec![0u8; chunk_size.max(1)].into_boxed_slice(),
            last_activity: Instant::now(),
            stats: SessionStats::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Give up the session, keeping its transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    /// Stream or still position, if bound
    pub fn cursor(&self) -> Option<StreamCursor> {
        self.cursor
    }

    /// Last successful read or write
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }

    /// Whether nothing happened for longer than `timeout`
    pub fn is_idle(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_activity) > timeout
    }

    /// Whether the session is waiting for request bytes
    pub fn wants_read(&self) -> bool {
        self.phase.wants_read()
    }

    /// Whether a write attempt would make progress
    pub fn wants_write(&self, sources: &SourceRegistry) -> bool {
        match self.phase {
            SessionPhase::Draining(_) => true,
            SessionPhase::Streaming => match self.cursor {
                Some(cursor) => sources
                    .get(cursor.source)
                    .is_some_and(|store| cursor.has_pending(store)),
                None => false,
            },
            SessionPhase::AwaitingHeaders | SessionPhase::Closed => false,
        }
    }

    /// Read what is available of the request head and route it once complete
    pub fn on_readable(&mut self, router: &Router, sources: &SourceRegistry) -> Flow {
        if !self.wants_read() {
            return Flow::Continue;
        }

        let room = self.header_limit.saturating_sub(self.request.len());
        let want = room.min(self.scratch.len());
        let n = match self.transport.read(&mut self.scratch[..want]) {
            Ok(0) => return Flow::Close(CloseReason::PeerClosed),
            Ok(n) => n,
            Err(e) if is_transient(&e) => return Flow::Continue,
            Err(e) => return self.fail("read", e),
        };

        self.last_activity = Instant::now();
        self.stats.bytes_received += n as u64;
        self.request.extend_from_slice(&self.scratch[..n]);

        if let Some(end) = find_head_end(&self.request) {
            let route = {
                let req = Request::parse(&self.request[..end]);
                tracing::info!(
                    session_id = self.id,
                    peer = %self.peer_addr,
                    method = %req.method,
                    target = %req.target(),
                    "Request"
                );
                router.route(&req, sources.len())
            };
            self.request.clear();
            self.begin(route, sources);
        } else if self.request.len() >= self.header_limit {
            tracing::warn!(
                session_id = self.id,
                size = self.request.len(),
                "Request head too large"
            );
            self.request.clear();
            self.begin(Route::BadRequest, sources);
        }

        Flow::Continue
    }

    /// Set up the response for a route
    pub fn begin(&mut self, route: Route, sources: &SourceRegistry) {
        let kind = route.kind();
        tracing::debug!(session_id = self.id, route = ?kind, "Routed");

        self.response_pos = 0;
        self.cursor = None;
        self.file = None;

        self.response = match route {
            Route::BadRequest => response::bad_request(),
            Route::AuthRequired => response::auth_required(),
            Route::NotFound => response::not_found(),
            Route::StreamInfo => {
                response::stream_info(sources.len(), sources.width(), sources.height())
            }
            Route::Stream { source } | Route::Still { source } => {
                let Some(store) = sources.get(source) else {
                    return self.begin(Route::NotFound, sources);
                };
                self.cursor = Some(StreamCursor::bind(source, store));
                if kind == RouteKind::Stream {
                    response::stream_header()
                } else {
                    response::still_header()
                }
            }
            Route::StaticFile {
                path,
                content_length,
                content_type,
            } => match File::open(&path) {
                Ok(file) => {
                    self.file = Some(file);
                    response::static_file_header(content_length, content_type)
                }
                Err(e) => {
                    tracing::warn!(
                        session_id = self.id,
                        path = %path.display(),
                        error = %e,
                        "Could not open file"
                    );
                    return self.begin(Route::NotFound, sources);
                }
            },
        };

        self.phase = SessionPhase::Draining(kind);
    }

    /// Send as much of the pending response as the transport accepts
    pub fn on_writable(&mut self, sources: &SourceRegistry) -> Flow {
        match self.transport.flush() {
            Err(e) if !is_transient(&e) => return self.fail("flush", e),
            _ => {}
        }

        match self.phase {
            SessionPhase::AwaitingHeaders => Flow::Continue,
            SessionPhase::Closed => Flow::Close(CloseReason::ResponseComplete),
            SessionPhase::Streaming => self.drain_stream(sources),
            SessionPhase::Draining(kind) => {
                if self.response_pos < self.response.len() {
                    let pending = self.response.slice(self.response_pos..);
                    let sent = match write_some(&mut self.transport, &pending) {
                        Ok(n) => n,
                        Err(e) => return self.fail("write", e),
                    };
                    self.record_sent(sent);
                    self.response_pos += sent;
                    if self.response_pos < self.response.len() {
                        return Flow::Continue;
                    }
                }

                match kind {
                    RouteKind::BadRequest
                    | RouteKind::AuthRequired
                    | RouteKind::NotFound
                    | RouteKind::StreamInfo => self.finish(),
                    RouteKind::Still => self.drain_still(sources),
                    RouteKind::StaticFile => self.drain_file(),
                    RouteKind::Stream => {
                        self.phase = SessionPhase::Streaming;
                        self.drain_stream(sources)
                    }
                }
            }
        }
    }

    /// Return to waiting for the next request on this connection
    pub fn reset(&mut self) {
        self.phase = SessionPhase::AwaitingHeaders;
        self.request.clear();
        self.response = Bytes::new();
        self.response_pos = 0;
        self.cursor = None;
        self.file = None;
    }

    fn drain_stream(&mut self, sources: &SourceRegistry) -> Flow {
        let Some(mut cursor) = self.cursor else {
            return self.finish();
        };
        let Some(store) = sources.get(cursor.source) else {
            return self.finish();
        };
        // Nothing captured yet
        let Some(chunk) = cursor.remaining(store) else {
            self.cursor = Some(cursor);
            return Flow::Continue;
        };

        let sent = if chunk.is_empty() {
            0
        } else {
            match write_some(&mut self.transport, &chunk) {
                Ok(n) => n,
                Err(e) => return self.fail("write", e),
            }
        };
        self.record_sent(sent);

        if cursor.advance(sent, store) {
            self.stats.frames_sent += 1;
        }
        self.cursor = Some(cursor);
        Flow::Continue
    }

    fn drain_still(&mut self, sources: &SourceRegistry) -> Flow {
        let payload = self.cursor.and_then(|cursor| {
            sources
                .get(cursor.source)
                .and_then(|store| cursor.remaining_payload(store))
        });
        let Some(payload) = payload else {
            tracing::debug!(session_id = self.id, "Still frame no longer available");
            self.phase = SessionPhase::Closed;
            return Flow::Close(CloseReason::FrameUnavailable);
        };

        if !payload.is_empty() {
            let sent = match write_some(&mut self.transport, &payload) {
                Ok(n) => n,
                Err(e) => return self.fail("write", e),
            };
            self.record_sent(sent);
            if let Some(cursor) = self.cursor.as_mut() {
                cursor.offset += sent;
            }
            if sent < payload.len() {
                return Flow::Continue;
            }
            self.stats.frames_sent += 1;
        }

        self.finish()
    }

    fn drain_file(&mut self) -> Flow {
        let Some(file) = self.file.as_mut() else {
            return self.finish();
        };

        let read = match file.read(&mut self.scratch) {
            Ok(n) => n,
            Err(e) => return self.fail("file read", e),
        };
        if read == 0 {
            tracing::debug!(session_id = self.id, "File sent, awaiting next request");
            self.stats.requests_served += 1;
            self.reset();
            return Flow::Continue;
        }

        let sent = match write_some(&mut self.transport, &self.scratch[..read]) {
            Ok(n) => n,
            Err(e) => return self.fail("write", e),
        };
        self.record_sent(sent);

        // Rewind over what the socket did not take
        if sent < read {
            let unsent = (read - sent) as i64;
            if let Some(file) = self.file.as_mut() {
                if let Err(e) = file.seek(SeekFrom::Current(-unsent)) {
                    return self.fail("file seek", e);
                }
            }
        }

        Flow::Continue
    }

    fn finish(&mut self) -> Flow {
        self.stats.requests_served += 1;
        self.phase = SessionPhase::Closed;
        Flow::Close(CloseReason::ResponseComplete)
    }

    fn fail(&mut self, op: &'static str, error: io::Error) -> Flow {
        tracing::debug!(session_id = self.id, op, error = %error, "Client I/O failed");
        self.phase = SessionPhase::Closed;
        Flow::Close(CloseReason::IoError)
    }

    fn record_sent(&mut self, sent: usize) {
        if sent > 0 {
            self.last_activity = Instant::now();
            self.stats.bytes_sent += sent as u64;
        }
    }
}

/// One write attempt; a full socket counts as zero progress
fn write_some<T: Write>(transport: &mut T, data: &[u8]) -> io::Result<usize> {
    match transport.write(data) {
        Ok(n) => Ok(n),
        Err(e) if is_transient(&e) => Ok(0),
        Err(e) => Err(e),
    }
}

fn is_transient(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::constants::{FRAME_FOOTER, FRAME_HEADER};
    use crate::registry::Frame;

    /// In-memory transport accepting at most `write_limit` bytes per write
    #[derive(Debug, Default)]
    struct MockTransport {
        input: Vec<u8>,
        read_pos: usize,
        /// Input fully consumed reads as EOF instead of WouldBlock
        eof: bool,
        output: Vec<u8>,
        write_limit: Option<usize>,
        block_writes: bool,
        fail_writes: bool,
    }

    impl MockTransport {
        fn with_input(input: &[u8]) -> Self {
            Self {
                input: input.to_vec(),
                ..Default::default()
            }
        }
    }

    impl Read for MockTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let rest = &self.input[self.read_pos..];
            if rest.is_empty() {
                if self.eof {
                    return Ok(0);
                }
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = rest.len().min(buf.len());
            buf[..n].copy_from_slice(&rest[..n]);
            self.read_pos += n;
            Ok(n)
        }
    }

    impl Write for MockTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_writes {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            if self.block_writes {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let n = self.write_limit.map_or(buf.len(), |limit| limit.min(buf.len()));
            self.output.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn session(transport: MockTransport) -> ClientSession<MockTransport> {
        ClientSession::new(1, "127.0.0.1:5000".parse().unwrap(), transport, 4096, 16 * 1024)
    }

    fn registry_with(frames: &[&[u8]]) -> SourceRegistry {
        let mut sources = SourceRegistry::new(1, 8, 640, 480);
        for frame in frames {
            sources.push(0, frame).unwrap();
        }
        sources
    }

    /// Drive writes until the session closes or has nothing left to send
    fn drain(session: &mut ClientSession<MockTransport>, sources: &SourceRegistry) -> Flow {
        for _ in 0..10_000 {
            let flow = session.on_writable(sources);
            if flow != Flow::Continue || !session.wants_write(sources) {
                return flow;
            }
        }
        Flow::Continue
    }

    #[test]
    fn test_partial_request_head() {
        let mut s = session(MockTransport::with_input(b"GET /stream/info HT"));
        let sources = registry_with(&[]);
        let router = Router::default();

        assert_eq!(s.on_readable(&router, &sources), Flow::Continue);
        assert_eq!(s.phase(), SessionPhase::AwaitingHeaders);

        s.transport_mut().input.extend_from_slice(b"TP/1.0\r\n\r\n");
        assert_eq!(s.on_readable(&router, &sources), Flow::Continue);
        assert_eq!(s.phase(), SessionPhase::Draining(RouteKind::StreamInfo));
        assert!(!s.wants_read());
        assert!(s.wants_write(&sources));
    }

    #[test]
    fn test_peer_close_while_reading() {
        let mut s = session(MockTransport {
            eof: true,
            ..Default::default()
        });
        let sources = registry_with(&[]);

        assert_eq!(
            s.on_readable(&Router::default(), &sources),
            Flow::Close(CloseReason::PeerClosed)
        );
    }

    #[test]
    fn test_oversized_head_is_bad_request() {
        let mut raw = b"GET / HTTP/1.0\r\nX-Fill: ".to_vec();
        raw.resize(5000, b'a');
        let mut s = session(MockTransport::with_input(&raw));
        let sources = registry_with(&[]);

        s.on_readable(&Router::default(), &sources);
        assert_eq!(s.phase(), SessionPhase::Draining(RouteKind::BadRequest));

        assert_eq!(drain(&mut s, &sources), Flow::Close(CloseReason::ResponseComplete));
        assert_eq!(s.transport().output, response::bad_request().to_vec());
    }

    #[test]
    fn test_stream_info_short_writes_are_exact() {
        let mut s = session(MockTransport {
            input: b"GET /stream/info HTTP/1.1\r\n\r\n".to_vec(),
            write_limit: Some(7),
            ..Default::default()
        });
        let sources = registry_with(&[]);

        s.on_readable(&Router::default(), &sources);
        assert_eq!(drain(&mut s, &sources), Flow::Close(CloseReason::ResponseComplete));

        let expected = response::stream_info(1, 640, 480);
        assert_eq!(s.transport().output, expected.to_vec());
        assert_eq!(s.stats().bytes_sent, expected.len() as u64);
    }

    #[test]
    fn test_stream_delivers_newest_frame() {
        let mut s = session(MockTransport {
            input: b"GET /stream/0 HTTP/1.1\r\n\r\n".to_vec(),
            write_limit: Some(5),
            ..Default::default()
        });
        let mut sources = registry_with(&[b"old", b"JPEGDATA"]);

        s.on_readable(&Router::default(), &sources);
        assert_eq!(s.cursor().map(|c| c.sequence), Some(1));

        assert_eq!(drain(&mut s, &sources), Flow::Continue);
        assert_eq!(s.phase(), SessionPhase::Streaming);
        assert!(!s.wants_write(&sources));

        let mut expected = response::stream_header().to_vec();
        expected.extend_from_slice(FRAME_HEADER.as_bytes());
        expected.extend_from_slice(b"JPEGDATA");
        expected.extend_from_slice(FRAME_FOOTER.as_bytes());
        assert_eq!(s.transport().output, expected);
        assert_eq!(s.stats().frames_sent, 1);

        // Next frame follows once captured
        sources.push(0, b"NEXT").unwrap();
        assert!(s.wants_write(&sources));
        drain(&mut s, &sources);
        expected.extend_from_slice(Frame::wrap(2, b"NEXT").data());
        assert_eq!(s.transport().output, expected);
        assert_eq!(s.stats().frames_sent, 2);
    }

    #[test]
    fn test_stream_starts_at_newest_then_follows() {
        let mut sources = registry_with(&[b"frame-0", b"frame-1", b"frame-2"]);
        let mut s = session(MockTransport {
            input: b"GET /stream/0 HTTP/1.0\r\nHost: x\r\n\r\n".to_vec(),
            write_limit: Some(11),
            ..Default::default()
        });

        s.on_readable(&Router::default(), &sources);
        drain(&mut s, &sources);

        let mut expected = response::stream_header().to_vec();
        expected.extend_from_slice(Frame::wrap(2, b"frame-2").data());
        assert_eq!(s.transport().output, expected);

        sources.push(0, b"frame-3").unwrap();
        drain(&mut s, &sources);
        expected.extend_from_slice(Frame::wrap(3, b"frame-3").data());
        assert_eq!(s.transport().output, expected);
    }

    #[test]
    fn test_stream_on_empty_store_waits() {
        let mut s = session(MockTransport::with_input(b"GET /stream/0 HTTP/1.0\r\n\r\n"));
        let mut sources = registry_with(&[]);

        s.on_readable(&Router::default(), &sources);
        assert_eq!(drain(&mut s, &sources), Flow::Continue);
        assert_eq!(s.transport().output, response::stream_header().to_vec());
        assert_eq!(s.cursor().map(|c| c.sequence), Some(0));

        sources.push(0, b"FIRST").unwrap();
        drain(&mut s, &sources);
        assert!(s.transport().output.ends_with(Frame::wrap(0, b"FIRST").data()));
    }

    #[test]
    fn test_lagging_stream_catches_up_without_writing() {
        let mut sources = registry_with(&[b"f0", b"f1", b"f2", b"f3"]);
        let mut s = session(MockTransport::default());
        s.begin(Route::Stream { source: 0 }, &sources);
        s.phase = SessionPhase::Streaming;
        s.cursor = Some(StreamCursor {
            source: 0,
            sequence: 3,
            offset: 4,
        });

        for i in 4..=17 {
            sources.push(0, format!("f{}", i).as_bytes()).unwrap();
        }
        s.transport_mut().block_writes = true;

        assert_eq!(s.on_writable(&sources), Flow::Continue);
        let cursor = s.cursor().unwrap();
        assert_eq!((cursor.sequence, cursor.offset), (17, 0));
        assert!(s.transport().output.is_empty());
    }

    #[test]
    fn test_still_sends_payload_and_closes() {
        let mut s = session(MockTransport {
            input: b"GET /still/0 HTTP/1.0\r\n\r\n".to_vec(),
            write_limit: Some(3),
            ..Default::default()
        });
        let sources = registry_with(&[b"\xFF\xD8still\xFF\xD9"]);

        s.on_readable(&Router::default(), &sources);
        assert_eq!(drain(&mut s, &sources), Flow::Close(CloseReason::ResponseComplete));

        let mut expected = response::still_header().to_vec();
        expected.extend_from_slice(b"\xFF\xD8still\xFF\xD9");
        assert_eq!(s.transport().output, expected);
    }

    #[test]
    fn test_still_on_empty_store_closes() {
        let mut s = session(MockTransport::with_input(b"GET /still/0 HTTP/1.0\r\n\r\n"));
        let sources = registry_with(&[]);

        s.on_readable(&Router::default(), &sources);
        assert_eq!(drain(&mut s, &sources), Flow::Close(CloseReason::FrameUnavailable));
        assert_eq!(s.transport().output, response::still_header().to_vec());
    }

    #[test]
    fn test_static_file_keep_alive() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let body: Vec<u8> = (0..40_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(root.join("video.bin"), &body).unwrap();

        let router = Router::new(Some(root), None);
        let sources = registry_with(&[]);
        let mut s = session(MockTransport {
            input: b"GET /video.bin HTTP/1.1\r\n\r\n".to_vec(),
            write_limit: Some(5000),
            ..Default::default()
        });

        s.on_readable(&router, &sources);
        assert_eq!(drain(&mut s, &sources), Flow::Continue);
        assert_eq!(s.phase(), SessionPhase::AwaitingHeaders);

        let mut expected = response::static_file_header(40_000, "application/octet").to_vec();
        expected.extend_from_slice(&body);
        assert_eq!(s.transport().output, expected);
        assert_eq!(s.stats().requests_served, 1);

        // Same connection serves another request
        s.transport_mut().input.extend_from_slice(b"GET /missing HTTP/1.1\r\n\r\n");
        s.on_readable(&router, &sources);
        assert_eq!(s.phase(), SessionPhase::Draining(RouteKind::NotFound));
    }

    #[test]
    fn test_write_error_closes() {
        let mut s = session(MockTransport {
            input: b"GET /nothing HTTP/1.0\r\n\r\n".to_vec(),
            fail_writes: true,
            ..Default::default()
        });
        let sources = registry_with(&[]);

        s.on_readable(&Router::default(), &sources);
        assert_eq!(s.on_writable(&sources), Flow::Close(CloseReason::IoError));
    }

    #[test]
    fn test_idle_detection() {
        let s = session(MockTransport::default());
        let now = s.last_activity();

        assert!(!s.is_idle(now + Duration::from_secs(30), Duration::from_secs(30)));
        assert!(s.is_idle(now + Duration::from_secs(31), Duration::from_secs(30)));
    }
}
