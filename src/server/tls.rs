//! TLS setup
//!
//! Certificates are loaded once at startup. Each accepted socket is then
//! driven through the handshake before it joins the client table, with a
//! hard time limit so a silent peer cannot stall the server.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::ServerConnection;
use tokio::net::TcpStream;

use super::connection::{SocketIo, TlsStream, TLS_BUFFER_LIMIT};
use crate::error::TlsError;

/// Build a rustls server context from PEM files
pub fn load_server_context(
    cert_path: &Path,
    key_path: &Path,
) -> Result<Arc<rustls::ServerConfig>, TlsError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;

    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_single_cert(certs, key)?;

    Ok(Arc::new(config))
}

fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, TlsError> {
    let file = File::open(path)
        .map_err(|e| TlsError::Certificate(format!("{}: {}", path.display(), e)))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TlsError::Certificate(format!("{}: {}", path.display(), e)))?;

    if certs.is_empty() {
        return Err(TlsError::Certificate(format!(
            "{}: no certificates found",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &Path) -> Result<PrivateKeyDer<'static>, TlsError> {
    let file = File::open(path)
        .map_err(|e| TlsError::PrivateKey(format!("{}: {}", path.display(), e)))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| TlsError::PrivateKey(format!("{}: {}", path.display(), e)))?
        .ok_or_else(|| TlsError::PrivateKey(format!("{}: no private key found", path.display())))
}

/// Complete the server side of a handshake within `limit`
pub async fn accept_handshake(
    socket: TcpStream,
    context: Arc<rustls::ServerConfig>,
    limit: Duration,
) -> Result<TlsStream, TlsError> {
    let mut session = ServerConnection::new(context)?;
    session.set_buffer_limit(Some(TLS_BUFFER_LIMIT));

    match tokio::time::timeout(limit, drive_handshake(&socket, &mut session)).await {
        Ok(Ok(())) => Ok(TlsStream::new(socket, session)),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(TlsError::HandshakeTimeout),
    }
}

async fn drive_handshake(
    socket: &TcpStream,
    session: &mut ServerConnection,
) -> Result<(), TlsError> {
    while session.is_handshaking() {
        if session.wants_write() {
            write_pending(socket, session).await?;
            continue;
        }

        socket.readable().await.map_err(TlsError::HandshakeIo)?;
        match session.read_tls(&mut SocketIo(socket)) {
            Ok(0) => {
                return Err(TlsError::HandshakeIo(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "peer closed during handshake",
                )))
            }
            Ok(_) => {
                if let Err(e) = session.process_new_packets() {
                    // Best effort delivery of the alert
                    let _ = session.write_tls(&mut SocketIo(socket));
                    return Err(e.into());
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {}
            Err(e) => return Err(TlsError::HandshakeIo(e)),
        }
    }

    // Final flight
    while session.wants_write() {
        write_pending(socket, session).await?;
    }
    Ok(())
}

async fn write_pending(socket: &TcpStream, session: &mut ServerConnection) -> Result<(), TlsError> {
    socket.writable().await.map_err(TlsError::HandshakeIo)?;
    match session.write_tls(&mut SocketIo(socket)) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(()),
        Err(e) => Err(TlsError::HandshakeIo(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_certificate_file() {
        let err = load_server_context(
            Path::new("/nonexistent/cert.pem"),
            Path::new("/nonexistent/key.pem"),
        )
        .unwrap_err();
        assert!(matches!(err, TlsError::Certificate(_)));
    }

    #[test]
    fn test_empty_certificate_file() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        std::fs::File::create(&cert).unwrap();
        std::fs::File::create(&key).unwrap();

        let err = load_server_context(&cert, &key).unwrap_err();
        assert!(matches!(err, TlsError::Certificate(_)));
    }

    #[test]
    fn test_missing_private_key() {
        let dir = tempfile::tempdir().unwrap();
        let cert = dir.path().join("cert.pem");
        let key = dir.path().join("key.pem");
        let mut file = std::fs::File::create(&cert).unwrap();
        // Any base64 body parses as a certificate block
        writeln!(file, "-----BEGIN CERTIFICATE-----").unwrap();
        writeln!(file, "AAAA").unwrap();
        writeln!(file, "-----END CERTIFICATE-----").unwrap();
        std::fs::File::create(&key).unwrap();

        let err = load_server_context(&cert, &key).unwrap_err();
        assert!(matches!(err, TlsError::PrivateKey(_)));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _client = TcpStream::connect(addr).await.unwrap();
        let (socket, _) = listener.accept().await.unwrap();

        // A context is needed to start a session; an unusable one is fine
        // because the peer never speaks.
        let provider = Arc::new(rustls::crypto::ring::default_provider());
        let resolver = Arc::new(rustls::server::ResolvesServerCertUsingSni::new());
        let context = rustls::ServerConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .unwrap()
            .with_no_client_auth()
            .with_cert_resolver(resolver);

        let err = accept_handshake(socket, Arc::new(context), Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, TlsError::HandshakeTimeout));
    }
}
