//! Error types
//!
//! Client-facing failures never surface here: they degrade to an HTTP
//! response inside the session. These errors cover startup, TLS and
//! capture, which are the only places the caller has to decide something.

use std::fmt;
use std::io;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
#[derive(Debug)]
pub enum Error {
    /// Underlying I/O failure
    Io(io::Error),
    /// TLS setup or handshake failure
    Tls(TlsError),
    /// Capture source failure
    Capture(CaptureError),
    /// Invalid configuration detected at startup
    Config(String),
    /// No listening socket could be bound
    Bind(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::Tls(e) => write!(f, "TLS error: {}", e),
            Error::Capture(e) => write!(f, "Capture error: {}", e),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
            Error::Bind(msg) => write!(f, "Could not bind to socket: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            Error::Tls(e) => Some(e),
            Error::Capture(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<TlsError> for Error {
    fn from(e: TlsError) -> Self {
        Error::Tls(e)
    }
}

impl From<CaptureError> for Error {
    fn from(e: CaptureError) -> Self {
        Error::Capture(e)
    }
}

/// TLS errors
#[derive(Debug)]
pub enum TlsError {
    /// Certificate file could not be read or contained no certificates
    Certificate(String),
    /// Private key file could not be read or contained no key
    PrivateKey(String),
    /// rustls rejected the configuration or a peer message
    Rustls(rustls::Error),
    /// Handshake did not finish within the configured timeout
    HandshakeTimeout,
    /// Socket error or EOF during the handshake
    HandshakeIo(io::Error),
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsError::Certificate(msg) => write!(f, "Could not load public certificate: {}", msg),
            TlsError::PrivateKey(msg) => write!(f, "Could not load private key: {}", msg),
            TlsError::Rustls(e) => write!(f, "{}", e),
            TlsError::HandshakeTimeout => write!(f, "Handshake timed out"),
            TlsError::HandshakeIo(e) => write!(f, "Handshake I/O error: {}", e),
        }
    }
}

impl std::error::Error for TlsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TlsError::Rustls(e) => Some(e),
            TlsError::HandshakeIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rustls::Error> for TlsError {
    fn from(e: rustls::Error) -> Self {
        TlsError::Rustls(e)
    }
}

/// Capture source errors
#[derive(Debug)]
pub enum CaptureError {
    /// Source produced no frame this tick
    NoFrame,
    /// Image directory contains no usable images
    NoImages(String),
    /// Frame data does not look like a JPEG
    NotJpeg,
    /// Reading from the source failed
    Io(io::Error),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NoFrame => write!(f, "Could not capture frame"),
            CaptureError::NoImages(dir) => write!(f, "No JPEG images found in {}", dir),
            CaptureError::NotJpeg => write!(f, "Frame is not a JPEG image"),
            CaptureError::Io(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for CaptureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CaptureError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CaptureError {
    fn from(e: io::Error) -> Self {
        CaptureError::Io(e)
    }
}
