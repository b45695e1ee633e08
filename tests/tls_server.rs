//! End-to-end tests over HTTPS with a self-signed certificate

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hawkeye_rs::capture::{FrameSource, StillSource};
use hawkeye_rs::protocol::constants::{FRAME_FOOTER, FRAME_HEADER};
use hawkeye_rs::protocol::response;
use hawkeye_rs::{Server, ServerConfig, TlsConfig};
use rustls::pki_types::ServerName;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::TlsConnector;

const WAIT: Duration = Duration::from_secs(5);

/// Baseline JPEG header with the given size and `scan_len` bytes of scan data
fn test_jpeg(width: u16, height: u16, scan_len: usize) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8, 0xFF, 0xC0, 0x00, 0x0B, 0x08];
    out.extend_from_slice(&height.to_be_bytes());
    out.extend_from_slice(&width.to_be_bytes());
    out.extend_from_slice(&[0x01, 0x01, 0x11, 0x00]);
    out.extend((0..scan_len).map(|i| (i % 251) as u8));
    out.extend_from_slice(&[0xFF, 0xD9]);
    out
}

struct Running {
    addr: SocketAddr,
    connector: TlsConnector,
    shutdown: oneshot::Sender<()>,
    handle: JoinHandle<hawkeye_rs::Result<()>>,
    _certs: TempDir,
}

impl Running {
    async fn connect(&self) -> TlsStream<TcpStream> {
        let socket = TcpStream::connect(self.addr).await.unwrap();
        let name = ServerName::try_from("localhost").unwrap();
        tokio::time::timeout(WAIT, self.connector.connect(name, socket))
            .await
            .expect("handshake timed out")
            .expect("handshake failed")
    }

    async fn stop(self) {
        let _ = self.shutdown.send(());
        let result = tokio::time::timeout(WAIT, self.handle)
            .await
            .expect("server did not stop")
            .expect("server task panicked");
        tokio_test::assert_ok!(result);
    }
}

async fn start(image: Vec<u8>) -> Running {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let certified = rcgen::generate_simple_self_signed(vec!["localhost".to_string()]).unwrap();
    let certs = tempfile::tempdir().unwrap();
    let cert_path = certs.path().join("cert.pem");
    let key_path = certs.path().join("key.pem");
    std::fs::write(&cert_path, certified.cert.pem()).unwrap();
    std::fs::write(&key_path, certified.key_pair.serialize_pem()).unwrap();

    let mut roots = rustls::RootCertStore::empty();
    roots.add(certified.cert.der().clone()).unwrap();
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let client_config = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let config = ServerConfig::with_addr("127.0.0.1", 0)
        .fps(50)
        .tls(TlsConfig::new(&cert_path, &key_path));
    let source = StillSource::new(image).unwrap();
    let sources: Vec<Box<dyn FrameSource>> = vec![Box::new(source)];
    let mut server = Server::bind(config, sources).await.unwrap();
    let addr = server.local_addrs()[0];

    let (shutdown, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        server
            .run_until(async {
                let _ = rx.await;
            })
            .await
    });

    Running {
        addr,
        connector: TlsConnector::from(Arc::new(client_config)),
        shutdown,
        handle,
        _certs: certs,
    }
}

/// Send a request and read until the server ends the TLS session
///
/// `read_to_end` fails with `UnexpectedEof` unless the server sent
/// `close_notify` before closing the socket.
async fn fetch(server: &Running, request: &str) -> Vec<u8> {
    let mut client = server.connect().await;
    client.write_all(request.as_bytes()).await.unwrap();

    let mut reply = Vec::new();
    tokio::time::timeout(WAIT, client.read_to_end(&mut reply))
        .await
        .expect("server did not close connection")
        .expect("connection closed without close_notify");
    reply
}

#[tokio::test]
async fn stream_info_over_tls() {
    let server = start(test_jpeg(640, 480, 64)).await;

    let reply = fetch(&server, "GET /stream/info HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
    assert_eq!(reply, response::stream_info(1, 640, 480).to_vec());

    let reply = fetch(&server, "GET /stream/7 HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply, response::not_found().to_vec());

    server.stop().await;
}

#[tokio::test]
async fn large_still_over_tls() {
    // Several times the TLS buffer limit, so writes stall and resume
    let image = test_jpeg(640, 480, 600_000);
    let server = start(image.clone()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let reply = fetch(&server, "GET /still/0 HTTP/1.0\r\n\r\n").await;
    let mut expected = response::still_header().to_vec();
    expected.extend_from_slice(&image);
    assert_eq!(reply.len(), expected.len());
    assert_eq!(reply, expected);

    server.stop().await;
}

#[tokio::test]
async fn stream_frames_over_tls() {
    let image = test_jpeg(320, 240, 100_000);
    let server = start(image.clone()).await;

    let mut client = server.connect().await;
    client
        .write_all(b"GET /stream/0 HTTP/1.1\r\n\r\n")
        .await
        .unwrap();

    let head = response::stream_header();
    let mut buf = vec![0u8; head.len()];
    tokio::time::timeout(WAIT, client.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(buf, head.to_vec());

    let mut part = FRAME_HEADER.as_bytes().to_vec();
    part.extend_from_slice(&image);
    part.extend_from_slice(FRAME_FOOTER.as_bytes());

    for _ in 0..2 {
        let mut buf = vec![0u8; part.len()];
        tokio::time::timeout(WAIT, client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(buf, part);
    }

    drop(client);
    server.stop().await;
}

#[tokio::test]
async fn plaintext_client_is_refused() {
    let server = start(test_jpeg(320, 240, 16)).await;

    let mut client = TcpStream::connect(server.addr).await.unwrap();
    client
        .write_all(b"GET /stream/info HTTP/1.0\r\n\r\n")
        .await
        .unwrap();

    // The handshake fails and the socket is dropped without an HTTP reply
    let mut reply = Vec::new();
    let _ = tokio::time::timeout(WAIT, client.read_to_end(&mut reply))
        .await
        .expect("server kept a failed handshake open");
    assert!(!reply.starts_with(b"HTTP/"));

    server.stop().await;
}
