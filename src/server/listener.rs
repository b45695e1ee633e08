//! Connection multiplexer
//!
//! One task owns the listeners, every client session and the frame stores.
//! Each tick waits (bounded by the poll timeout) until some socket is ready,
//! then gives each ready session exactly one read or write attempt. Capture
//! runs between ticks at the configured frame rate, so frame stores are
//! never touched concurrently.

use std::collections::HashMap;
use std::future::{poll_fn, Future};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::task::Poll;
use std::time::Instant;

use tokio::net::{lookup_host, TcpListener, TcpStream};

use super::config::ServerConfig;
use super::connection::Connection;
use super::router::Router;
use super::tls;
use crate::capture::FrameSource;
use crate::error::{Error, Result};
use crate::registry::{FrameStore, SourceRegistry};
use crate::session::{ClientSession, CloseReason, Flow};
use crate::stats::CaptureStats;

/// A capture source and its counters
struct CaptureSlot {
    source: Box<dyn FrameSource>,
    stats: CaptureStats,
}

/// Ended TLS session still sending its final records
struct Closing {
    connection: Connection,
    since: Instant,
}

/// Sockets found ready during one wait
#[derive(Default)]
struct Readiness {
    accepted: Vec<(TcpStream, SocketAddr)>,
    readable: Vec<u64>,
    writable: Vec<u64>,
    flushable: Vec<u64>,
}

impl Readiness {
    fn len(&self) -> usize {
        self.accepted.len() + self.readable.len() + self.writable.len() + self.flushable.len()
    }
}

/// MJPEG server
pub struct Server {
    config: ServerConfig,
    listeners: Vec<TcpListener>,
    local_addrs: Vec<SocketAddr>,
    tls: Option<Arc<rustls::ServerConfig>>,
    router: Router,
    sources: SourceRegistry,
    capture: Vec<CaptureSlot>,
    sessions: HashMap<u64, ClientSession<Connection>>,
    closing: HashMap<u64, Closing>,
    next_session_id: u64,
}

impl Server {
    /// Validate the configuration, load TLS material and bind listeners
    ///
    /// One frame store is created per capture source, in order.
    pub async fn bind(config: ServerConfig, capture: Vec<Box<dyn FrameSource>>) -> Result<Self> {
        let config = config.validate()?;
        let router = Router::new(config.static_root.clone(), config.auth_secret());

        if router.requires_auth() && config.tls.is_none() {
            tracing::warn!("Basic auth without TLS sends credentials in the clear");
        }

        let tls = match &config.tls {
            Some(tls) => Some(tls::load_server_context(&tls.cert_path, &tls.key_path)?),
            None => None,
        };

        let listeners = bind_listeners(&config.host, config.port).await?;
        let local_addrs = listeners
            .iter()
            .filter_map(|listener| listener.local_addr().ok())
            .collect();

        let (width, height) = capture
            .first()
            .map(|source| (source.width(), source.height()))
            .filter(|&(width, height)| width > 0 && height > 0)
            .unwrap_or((config.width, config.height));
        let stores = capture
            .iter()
            .map(|_| FrameStore::with_max_frame_size(config.frame_buffer_len, config.max_frame_size))
            .collect();
        let sources = SourceRegistry::from_stores(stores, width, height);

        for (index, source) in capture.iter().enumerate() {
            tracing::info!(
                source = index,
                name = %source.name(),
                width = source.width(),
                height = source.height(),
                "Video source ready"
            );
        }

        Ok(Self {
            listeners,
            local_addrs,
            tls,
            router,
            sources,
            capture: capture
                .into_iter()
                .map(|source| CaptureSlot {
                    source,
                    stats: CaptureStats::default(),
                })
                .collect(),
            sessions: HashMap::new(),
            closing: HashMap::new(),
            next_session_id: 1,
            config,
        })
    }

    /// Addresses the listeners are bound to
    pub fn local_addrs(&self) -> &[SocketAddr] {
        &self.local_addrs
    }

    /// The validated configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Frame stores, one per source
    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    /// Frame stores, for feeding frames from outside the capture tick
    pub fn sources_mut(&mut self) -> &mut SourceRegistry {
        &mut self.sources
    }

    /// Counters for a capture source
    pub fn capture_stats(&self, source: usize) -> Option<&CaptureStats> {
        self.capture.get(source).map(|slot| &slot.stats)
    }

    /// Number of connected clients
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Capture one frame from every source into its store
    pub fn capture_tick(&mut self) {
        for (index, slot) in self.capture.iter_mut().enumerate() {
            let frame = match slot.source.capture() {
                Ok(frame) => frame,
                Err(e) => {
                    slot.stats.record_drop();
                    tracing::error!(source = index, error = %e, "Could not capture frame");
                    continue;
                }
            };

            match self.sources.push(index, &frame) {
                Ok(sequence) => {
                    slot.stats.record_frame(frame.len());
                    tracing::trace!(source = index, sequence, size = frame.len(), "Frame stored");
                }
                Err(e) => {
                    slot.stats.record_drop();
                    tracing::warn!(source = index, error = %e, "Frame rejected");
                }
            }
        }
    }

    /// Run one multiplexer tick
    ///
    /// Waits up to the poll timeout for readiness, admits new clients, gives
    /// each ready session one read or write attempt and drops idle sessions.
    /// Returns the number of readiness events handled.
    pub async fn serve_clients(&mut self) -> usize {
        let ready = {
            let listeners = &self.listeners;
            let sessions = &self.sessions;
            let closing = &self.closing;
            let sources = &self.sources;

            let wait = poll_fn(|cx| {
                let mut ready = Readiness::default();

                for listener in listeners {
                    match listener.poll_accept(cx) {
                        Poll::Ready(Ok(accepted)) => ready.accepted.push(accepted),
                        Poll::Ready(Err(e)) => {
                            tracing::error!(error = %e, "Failed to accept connection")
                        }
                        Poll::Pending => {}
                    }
                }

                for (&id, session) in sessions {
                    let conn = session.transport();
                    if session.wants_read()
                        && (conn.has_buffered_input() || conn.poll_read_ready(cx).is_ready())
                    {
                        ready.readable.push(id);
                    }
                    if (session.wants_write(sources) || conn.has_buffered_output())
                        && conn.poll_write_ready(cx).is_ready()
                    {
                        ready.writable.push(id);
                    }
                }

                for (&id, pending) in closing {
                    if pending.connection.poll_write_ready(cx).is_ready() {
                        ready.flushable.push(id);
                    }
                }

                if ready.len() == 0 {
                    Poll::Pending
                } else {
                    Poll::Ready(ready)
                }
            });

            tokio::time::timeout(self.config.poll_timeout, wait)
                .await
                .unwrap_or_default()
        };
        let events = ready.len();

        for (socket, peer_addr) in ready.accepted {
            self.admit(socket, peer_addr).await;
        }

        for id in ready.readable {
            let Some(session) = self.sessions.get_mut(&id) else {
                continue;
            };
            if let Flow::Close(reason) = session.on_readable(&self.router, &self.sources) {
                self.close_session(id, reason);
            }
        }

        for id in ready.writable {
            let Some(session) = self.sessions.get_mut(&id) else {
                continue;
            };
            if let Flow::Close(reason) = session.on_writable(&self.sources) {
                self.close_session(id, reason);
            }
        }

        for id in ready.flushable {
            self.flush_closing(id);
        }

        self.sweep_idle(Instant::now());
        events
    }

    /// Capture and serve until `shutdown` completes
    pub async fn run_until<F>(&mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let interval = self.config.frame_interval();
        tracing::info!(
            addrs = ?self.local_addrs,
            sources = self.sources.len(),
            fps = self.config.fps,
            tls = self.tls.is_some(),
            "Server running"
        );

        tokio::pin!(shutdown);
        let mut next_capture = tokio::time::Instant::now();

        loop {
            self.capture_tick();

            // A slow capture must not cause a burst of catch-up ticks
            next_capture = (next_capture + interval).max(tokio::time::Instant::now());

            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
                _ = self.serve_until(next_capture) => {}
            }
        }

        self.shutdown();
        Ok(())
    }

    /// Capture and serve forever
    pub async fn run(&mut self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Disconnect every client and stop listening
    pub fn shutdown(&mut self) {
        let ids: Vec<u64> = self.sessions.keys().copied().collect();
        for id in ids {
            self.close_session(id, CloseReason::Shutdown);
        }
        self.closing.clear();
        self.listeners.clear();
    }

    async fn serve_until(&mut self, deadline: tokio::time::Instant) {
        loop {
            self.serve_clients().await;
            if tokio::time::Instant::now() >= deadline {
                return;
            }
        }
    }

    async fn admit(&mut self, socket: TcpStream, peer_addr: SocketAddr) {
        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(peer = %peer_addr, error = %e, "Failed to configure socket");
            return;
        }

        let connection = match &self.tls {
            Some(context) => {
                match tls::accept_handshake(
                    socket,
                    Arc::clone(context),
                    self.config.tls_handshake_timeout,
                )
                .await
                {
                    Ok(stream) => Connection::Tls(stream),
                    Err(e) => {
                        tracing::warn!(peer = %peer_addr, error = %e, "TLS handshake failed");
                        return;
                    }
                }
            }
            None => Connection::Plain(socket),
        };

        let session_id = self.next_session_id;
        self.next_session_id += 1;

        tracing::info!(
            session_id,
            peer = %peer_addr,
            tls = connection.is_tls(),
            "Client connected"
        );

        self.sessions.insert(
            session_id,
            ClientSession::new(
                session_id,
                peer_addr,
                connection,
                self.config.max_request_header_size,
                self.config.write_chunk_size,
            ),
        );
    }

    fn close_session(&mut self, id: u64, reason: CloseReason) {
        let Some(session) = self.sessions.remove(&id) else {
            return;
        };
        let stats = session.stats();

        tracing::info!(
            session_id = id,
            peer = %session.peer_addr(),
            %reason,
            "Client disconnected"
        );
        tracing::debug!(
            session_id = id,
            bytes_received = stats.bytes_received,
            bytes_sent = stats.bytes_sent,
            frames_sent = stats.frames_sent,
            requests = stats.requests_served,
            bitrate = stats.send_bitrate(),
            duration_ms = stats.duration().as_millis() as u64,
            "Session stats"
        );

        // Dropping the session closes the socket and any open file; TLS
        // peers get close_notify before the socket goes away
        let mut connection = session.into_transport();
        if !connection.is_tls() || reason == CloseReason::IoError {
            return;
        }
        connection.send_close_notify();
        let flushed = match connection.flush_pending() {
            Ok(flushed) => flushed,
            Err(e) => {
                tracing::debug!(session_id = id, error = %e, "Could not send close_notify");
                return;
            }
        };
        if !flushed && !matches!(reason, CloseReason::Shutdown | CloseReason::Timeout) {
            self.closing.insert(
                id,
                Closing {
                    connection,
                    since: Instant::now(),
                },
            );
        }
    }

    fn flush_closing(&mut self, id: u64) {
        let Some(pending) = self.closing.get_mut(&id) else {
            return;
        };
        match pending.connection.flush_pending() {
            Ok(false) => {}
            Ok(true) => {
                self.closing.remove(&id);
                tracing::trace!(session_id = id, "TLS close flushed");
            }
            Err(e) => {
                self.closing.remove(&id);
                tracing::debug!(session_id = id, error = %e, "Could not flush TLS close");
            }
        }
    }

    fn sweep_idle(&mut self, now: Instant) {
        let timeout = self.config.keep_alive_timeout;
        let idle: Vec<u64> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_idle(now, timeout))
            .map(|(&id, _)| id)
            .collect();

        for id in idle {
            self.close_session(id, CloseReason::Timeout);
        }

        self.closing.retain(|&id, pending| {
            let alive = now.saturating_duration_since(pending.since) <= timeout;
            if !alive {
                tracing::debug!(session_id = id, "Gave up flushing TLS close");
            }
            alive
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if !self.sessions.is_empty() {
            self.shutdown();
        }
    }
}

/// Bind at most one IPv6 and one IPv4 listener for `host:port`
///
/// An empty host binds the wildcard addresses. Fails only when nothing
/// could be bound.
pub async fn bind_listeners(host: &str, port: u16) -> Result<Vec<TcpListener>> {
    let candidates: Vec<SocketAddr> = if host.is_empty() {
        vec![
            SocketAddr::from((Ipv6Addr::UNSPECIFIED, port)),
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
        ]
    } else {
        lookup_host((host, port))
            .await
            .map_err(|e| Error::Bind(format!("{}:{}: {}", host, port, e)))?
            .collect()
    };

    let mut listeners = Vec::new();
    for ipv6 in [true, false] {
        for addr in candidates.iter().filter(|addr| addr.is_ipv6() == ipv6) {
            match TcpListener::bind(*addr).await {
                Ok(listener) => {
                    tracing::info!(addr = %addr, "Listening");
                    listeners.push(listener);
                    break;
                }
                Err(e) => tracing::debug!(addr = %addr, error = %e, "Could not bind"),
            }
        }
    }

    if listeners.is_empty() {
        return Err(Error::Bind(format!("{}:{}", host, port)));
    }
    Ok(listeners)
}
