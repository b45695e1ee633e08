//! Server configuration

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::protocol::constants::*;
use crate::protocol::encode_secret;

/// Slowest capture rate accepted
pub const MIN_FPS: u32 = 1;
/// Fastest capture rate accepted
pub const MAX_FPS: u32 = 50;

/// Certificate and key for HTTPS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM file holding the certificate chain
    pub cert_path: PathBuf,
    /// PEM file holding the private key
    pub key_path: PathBuf,
}

impl TlsConfig {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }
}

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host name or address to listen on, empty for all interfaces
    pub host: String,

    /// TCP port
    pub port: u16,

    /// Directory served for non-stream paths
    pub static_root: Option<PathBuf>,

    /// `user:password` required through Basic auth
    pub credentials: Option<String>,

    /// Serve HTTPS instead of HTTP
    pub tls: Option<TlsConfig>,

    /// Frames retained per source
    pub frame_buffer_len: usize,

    /// Largest JPEG accepted from a capture source
    pub max_frame_size: usize,

    /// Upper bound on one readiness wait
    pub poll_timeout: Duration,

    /// Inactivity after which a client is dropped
    pub keep_alive_timeout: Duration,

    /// Time allowed for a TLS handshake to finish
    pub tls_handshake_timeout: Duration,

    /// Capture rate in frames per second
    pub fps: u32,

    /// Frame width reported when no source provides one
    pub width: u32,

    /// Frame height reported when no source provides one
    pub height: u32,

    /// Request heads longer than this are rejected
    pub max_request_header_size: usize,

    /// Largest single write for static files
    pub write_chunk_size: usize,

    /// Enable TCP_NODELAY on accepted sockets
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            static_root: None,
            credentials: None,
            tls: None,
            frame_buffer_len: DEFAULT_FRAME_BUFFER_LEN,
            max_frame_size: MAX_FRAME_SIZE,
            poll_timeout: Duration::from_millis(10),
            keep_alive_timeout: Duration::from_secs(30),
            tls_handshake_timeout: Duration::from_secs(5),
            fps: 5,
            width: 640,
            height: 480,
            max_request_header_size: MAX_REQUEST_HEADER_SIZE,
            write_chunk_size: SERVER_BUFFER_SIZE,
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Create a config listening on `host:port`
    pub fn with_addr(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Set the listen host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the listen port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Serve static files from `root`
    pub fn static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = Some(root.into());
        self
    }

    /// Require `user:password` through Basic auth
    pub fn credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }

    /// Enable HTTPS
    pub fn tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Set frames retained per source
    pub fn frame_buffer_len(mut self, len: usize) -> Self {
        self.frame_buffer_len = len.max(1);
        self
    }

    /// Set the capture rate, clamped to `MIN_FPS..=MAX_FPS`
    pub fn fps(mut self, fps: u32) -> Self {
        self.fps = fps.clamp(MIN_FPS, MAX_FPS);
        self
    }

    /// Set the fallback frame dimensions
    pub fn dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Set the readiness wait bound
    pub fn poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the inactivity timeout
    pub fn keep_alive_timeout(mut self, timeout: Duration) -> Self {
        self.keep_alive_timeout = timeout;
        self
    }

    /// Set the TLS handshake timeout
    pub fn tls_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.tls_handshake_timeout = timeout;
        self
    }

    /// Set the request head limit
    pub fn max_request_header_size(mut self, size: usize) -> Self {
        self.max_request_header_size = size.max(4);
        self
    }

    /// Time between capture ticks
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs(1) / self.fps.clamp(MIN_FPS, MAX_FPS)
    }

    /// Base64 secret compared against `Authorization` headers
    pub fn auth_secret(&self) -> Option<String> {
        self.credentials.as_deref().map(encode_secret)
    }

    /// Check settings and canonicalize the static root
    ///
    /// Fails when the static root or TLS files do not exist.
    pub fn validate(mut self) -> Result<Self> {
        if let Some(root) = &self.static_root {
            let canonical = root.canonicalize().map_err(|e| {
                Error::Config(format!(
                    "static root {} does not exist: {}",
                    root.display(),
                    e
                ))
            })?;
            if !canonical.is_dir() {
                return Err(Error::Config(format!(
                    "static root {} is not a directory",
                    canonical.display()
                )));
            }
            self.static_root = Some(canonical);
        }

        if let Some(tls) = &self.tls {
            for path in [&tls.cert_path, &tls.key_path] {
                if !path.is_file() {
                    return Err(Error::Config(format!(
                        "{} does not exist",
                        path.display()
                    )));
                }
            }
        }

        if let Some(credentials) = &self.credentials {
            if !credentials.contains(':') {
                return Err(Error::Config(
                    "credentials must be of the form user:password".into(),
                ));
            }
        }

        if self.frame_buffer_len == 0 {
            return Err(Error::Config("frame buffer length must be at least 1".into()));
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.port, 8000);
        assert!(config.host.is_empty());
        assert_eq!(config.frame_buffer_len, 8);
        assert_eq!(config.keep_alive_timeout, Duration::from_secs(30));
        assert_eq!(config.poll_timeout, Duration::from_millis(10));
        assert_eq!(config.max_request_header_size, 4096);
        assert_eq!(config.write_chunk_size, 16 * 1024);
        assert_eq!((config.width, config.height), (640, 480));
        assert!(config.tls.is_none());
        assert!(config.auth_secret().is_none());
    }

    #[test]
    fn test_with_addr() {
        let config = ServerConfig::with_addr("127.0.0.1", 9000);

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_builder_fps_clamped() {
        assert_eq!(ServerConfig::default().fps(0).fps, MIN_FPS);
        assert_eq!(ServerConfig::default().fps(200).fps, MAX_FPS);
        assert_eq!(ServerConfig::default().fps(10).fps, 10);
    }

    #[test]
    fn test_frame_interval() {
        let config = ServerConfig::default().fps(5);
        assert_eq!(config.frame_interval(), Duration::from_millis(200));
    }

    #[test]
    fn test_auth_secret() {
        let config = ServerConfig::default().credentials("user:pass");
        assert_eq!(config.auth_secret().as_deref(), Some("dXNlcjpwYXNz"));
    }

    #[test]
    fn test_validate_static_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig::default()
            .static_root(dir.path().join("."))
            .validate()
            .unwrap();

        assert_eq!(config.static_root, Some(dir.path().canonicalize().unwrap()));

        let err = ServerConfig::default()
            .static_root(dir.path().join("missing"))
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_tls_files() {
        let err = ServerConfig::default()
            .tls(TlsConfig::new("/nonexistent/cert.pem", "/nonexistent/key.pem"))
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_validate_credentials() {
        assert!(ServerConfig::default().credentials("nocolon").validate().is_err());
        assert!(ServerConfig::default().credentials("a:b").validate().is_ok());
    }
}
