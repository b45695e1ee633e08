//! Client transport
//!
//! Non-blocking `io::Read`/`io::Write` over an accepted tokio socket, with
//! or without TLS. Reads and writes never wait: when the socket is not ready
//! they fail with `WouldBlock` and the multiplexer retries on a later tick.

use std::io::{self, Read, Write};
use std::task::{Context, Poll};

use rustls::ServerConnection;
use tokio::net::TcpStream;

/// Plaintext queued inside rustls before writes report `WouldBlock`
pub const TLS_BUFFER_LIMIT: usize = 64 * 1024;

/// Accepted client socket
#[derive(Debug)]
pub enum Connection {
    Plain(TcpStream),
    Tls(TlsStream),
}

impl Connection {
    /// Underlying TCP socket
    pub fn socket(&self) -> &TcpStream {
        match self {
            Connection::Plain(socket) => socket,
            Connection::Tls(tls) => &tls.socket,
        }
    }

    /// Whether decrypted bytes are waiting that the socket will not signal
    pub fn has_buffered_input(&self) -> bool {
        match self {
            Connection::Plain(_) => false,
            Connection::Tls(tls) => tls.buffered_plaintext > 0,
        }
    }

    /// Whether encrypted bytes are waiting to be flushed to the socket
    pub fn has_buffered_output(&self) -> bool {
        match self {
            Connection::Plain(_) => false,
            Connection::Tls(tls) => tls.session.wants_write(),
        }
    }

    /// Register interest in readability
    pub fn poll_read_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.socket().poll_read_ready(cx)
    }

    /// Register interest in writability
    pub fn poll_write_ready(&self, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.socket().poll_write_ready(cx)
    }

    /// Whether the connection is encrypted
    pub fn is_tls(&self) -> bool {
        matches!(self, Connection::Tls(_))
    }

    /// Queue a TLS `close_notify` alert behind any pending records
    pub fn send_close_notify(&mut self) {
        if let Connection::Tls(tls) = self {
            tls.session.send_close_notify();
        }
    }

    /// Push queued TLS records without waiting
    ///
    /// Returns `Ok(true)` once nothing is left to send.
    pub fn flush_pending(&mut self) -> io::Result<bool> {
        match self {
            Connection::Plain(_) => Ok(true),
            Connection::Tls(tls) => match tls.flush_tls() {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
                Err(e) => Err(e),
            },
        }
    }
}

impl Read for Connection {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(socket) => socket.try_read(buf),
            Connection::Tls(tls) => tls.read(buf),
        }
    }
}

impl Write for Connection {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Connection::Plain(socket) => socket.try_write(buf),
            Connection::Tls(tls) => tls.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Connection::Plain(_) => Ok(()),
            Connection::Tls(tls) => tls.flush(),
        }
    }
}

/// Established TLS session over a tokio socket
pub struct TlsStream {
    socket: TcpStream,
    session: Box<ServerConnection>,
    /// Decrypted bytes rustls holds for the next read
    buffered_plaintext: usize,
}

impl std::fmt::Debug for TlsStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsStream")
            .field("socket", &self.socket)
            .field("buffered_plaintext", &self.buffered_plaintext)
            .finish()
    }
}

impl TlsStream {
    /// Wrap a socket whose handshake has completed
    pub(crate) fn new(socket: TcpStream, session: ServerConnection) -> Self {
        Self {
            socket,
            session: Box::new(session),
            buffered_plaintext: 0,
        }
    }

    /// Push queued TLS records to the socket until done or it would block
    fn flush_tls(&mut self) -> io::Result<()> {
        while self.session.wants_write() {
            if self.session.write_tls(&mut SocketIo(&self.socket))? == 0 {
                return Err(io::ErrorKind::WriteZero.into());
            }
        }
        Ok(())
    }
}

impl Read for TlsStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.session.reader().read(buf) {
                Ok(n) => {
                    self.buffered_plaintext = self.buffered_plaintext.saturating_sub(n);
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
                Err(e) => return Err(e),
            }

            if self.session.read_tls(&mut SocketIo(&self.socket))? == 0 {
                return Ok(0);
            }
            let state = self
                .session
                .process_new_packets()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
            self.buffered_plaintext = state.plaintext_bytes_to_read();

            // Key updates and alerts may have queued records of our own
            match self.flush_tls() {
                Err(e) if e.kind() != io::ErrorKind::WouldBlock => return Err(e),
                _ => {}
            }
        }
    }
}

impl Write for TlsStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.flush_tls() {
            Err(e) if e.kind() != io::ErrorKind::WouldBlock => return Err(e),
            _ => {}
        }

        let accepted = self.session.writer().write(buf)?;

        match self.flush_tls() {
            Err(e) if e.kind() != io::ErrorKind::WouldBlock => return Err(e),
            _ => {}
        }

        if accepted == 0 && !buf.is_empty() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_tls()
    }
}

/// Adapter giving rustls non-blocking access to a shared socket
pub(crate) struct SocketIo<'a>(pub(crate) &'a TcpStream);

impl Read for SocketIo<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.try_read(buf)
    }
}

impl Write for SocketIo<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.try_write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
