//! Request routing
//!
//! A pure decision over the parsed request and the server's fixed settings.
//! Binding a session to a frame store position happens afterwards, in the
//! session, so identical inputs always give identical routes.

use std::path::{Path, PathBuf};

use crate::protocol::constants::{
    INDEX_FILE_NAME, PUBLIC_PREFIX, STILL_PREFIX, STREAM_INFO_PATH, STREAM_PREFIX,
};
use crate::protocol::{check_basic_auth, mime_type, Request};

/// Outcome of routing one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Malformed request line, wrong method or protocol
    BadRequest,
    /// Authorization configured and missing or wrong
    AuthRequired,
    /// Unknown source index or missing static file
    NotFound,
    /// JSON description of the sources
    StreamInfo,
    /// Live multipart stream from a source
    Stream { source: usize },
    /// Single JPEG from a source
    Still { source: usize },
    /// File below the static root
    StaticFile {
        path: PathBuf,
        content_length: u64,
        content_type: &'static str,
    },
}

impl Route {
    /// The route's kind without its data
    pub fn kind(&self) -> RouteKind {
        match self {
            Route::BadRequest => RouteKind::BadRequest,
            Route::AuthRequired => RouteKind::AuthRequired,
            Route::NotFound => RouteKind::NotFound,
            Route::StreamInfo => RouteKind::StreamInfo,
            Route::Stream { .. } => RouteKind::Stream,
            Route::Still { .. } => RouteKind::Still,
            Route::StaticFile { .. } => RouteKind::StaticFile,
        }
    }
}

/// Classification of a route, kept by the session while draining
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteKind {
    BadRequest,
    AuthRequired,
    NotFound,
    StreamInfo,
    Stream,
    Still,
    StaticFile,
}

impl RouteKind {
    /// Whether the whole response is the canned head+body buffer
    pub fn is_canned(&self) -> bool {
        matches!(
            self,
            RouteKind::BadRequest
                | RouteKind::AuthRequired
                | RouteKind::NotFound
                | RouteKind::StreamInfo
        )
    }
}

/// Routing settings fixed at server construction
#[derive(Debug, Clone, Default)]
pub struct Router {
    /// Canonical static root, if static files are served
    static_root: Option<PathBuf>,
    /// Base64 `user:pass` expected after `Basic`
    auth_secret: Option<String>,
}

impl Router {
    /// Create a router
    ///
    /// `static_root` must already be canonical; resolved files are checked
    /// against it component by component.
    pub fn new(static_root: Option<PathBuf>, auth_secret: Option<String>) -> Self {
        Self {
            static_root,
            auth_secret,
        }
    }

    /// Whether requests need credentials
    pub fn requires_auth(&self) -> bool {
        self.auth_secret.is_some()
    }

    /// Whether `path` is served without credentials
    ///
    /// Only paths that stay below the public prefix qualify; a `..` segment
    /// could climb back out of it before static resolution.
    pub fn is_public(path: &str) -> bool {
        path.strip_prefix(PUBLIC_PREFIX)
            .is_some_and(|rest| !rest.split('/').any(|segment| segment == ".."))
    }

    /// Route a request against `source_count` video sources
    pub fn route(&self, req: &Request<'_>, source_count: usize) -> Route {
        if !req.is_well_formed() || req.method != "GET" || req.protocol != "HTTP" {
            return Route::BadRequest;
        }

        let path: &str = &req.path;

        // Static images below the public prefix are served without credentials
        if !Self::is_public(path)
            && !check_basic_auth(req.authorization.as_deref(), self.auth_secret.as_deref())
        {
            return Route::AuthRequired;
        }

        if let Some(rest) = path.strip_prefix(STREAM_PREFIX) {
            if path == STREAM_INFO_PATH {
                return Route::StreamInfo;
            }
            return match source_index(rest, source_count) {
                Some(source) => Route::Stream { source },
                None => Route::NotFound,
            };
        }

        if let Some(rest) = path.strip_prefix(STILL_PREFIX) {
            return match source_index(rest, source_count) {
                Some(source) => Route::Still { source },
                None => Route::NotFound,
            };
        }

        match &self.static_root {
            Some(root) => resolve_static(root, path),
            None => Route::NotFound,
        }
    }
}

/// Parse a source index the way `atoi` would and check it against the count
///
/// Leading digits are used, anything after them is ignored, and a suffix
/// with no digits reads as 0.
fn source_index(suffix: &str, source_count: usize) -> Option<usize> {
    let trimmed = suffix.trim_start_matches([' ', '\t']);
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let end = digits
        .bytes()
        .position(|c| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    let index: usize = if end == 0 {
        0
    } else {
        digits[..end].parse().ok()?
    };

    if negative && index != 0 {
        return None;
    }
    (index < source_count).then_some(index)
}

/// Resolve a request path below the static root
fn resolve_static(root: &Path, path: &str) -> Route {
    let mut candidate = root.as_os_str().to_owned();
    candidate.push(path);
    if path.ends_with('/') {
        candidate.push(INDEX_FILE_NAME);
    }

    // Canonicalizing also checks that the file exists
    let Ok(resolved) = std::fs::canonicalize(&candidate) else {
        return Route::NotFound;
    };
    if !resolved.starts_with(root) {
        return Route::NotFound;
    }

    match std::fs::metadata(&resolved) {
        Ok(meta) if meta.is_file() => {
            let content_type = resolved
                .file_name()
                .and_then(|name| name.to_str())
                .map(mime_type)
                .unwrap_or(crate::protocol::mime::DEFAULT_MIME_TYPE);

            Route::StaticFile {
                content_length: meta.len(),
                content_type,
                path: resolved,
            }
        }
        _ => Route::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_secret;

    fn request(raw: &str) -> Vec<u8> {
        raw.as_bytes().to_vec()
    }

    fn route(router: &Router, raw: &str, sources: usize) -> Route {
        let buf = request(raw);
        router.route(&Request::parse(&buf), sources)
    }

    #[test]
    fn test_bad_requests() {
        let router = Router::default();

        assert_eq!(route(&router, "GET /stream/0\r\n\r\n", 1), Route::BadRequest);
        assert_eq!(route(&router, "POST /stream/0 HTTP/1.0\r\n\r\n", 1), Route::BadRequest);
        assert_eq!(route(&router, "GET /stream/0 RTSP/1.0\r\n\r\n", 1), Route::BadRequest);
    }

    #[test]
    fn test_stream_routes() {
        let router = Router::default();

        assert_eq!(route(&router, "GET /stream/info HTTP/1.0\r\n\r\n", 2), Route::StreamInfo);
        assert_eq!(
            route(&router, "GET /stream/1 HTTP/1.0\r\n\r\n", 2),
            Route::Stream { source: 1 }
        );
        assert_eq!(route(&router, "GET /stream/5 HTTP/1.0\r\n\r\n", 2), Route::NotFound);
        assert_eq!(route(&router, "GET /stream/-1 HTTP/1.0\r\n\r\n", 2), Route::NotFound);
        assert_eq!(
            route(&router, "GET /still/0 HTTP/1.0\r\n\r\n", 2),
            Route::Still { source: 0 }
        );
        assert_eq!(route(&router, "GET /still/2 HTTP/1.0\r\n\r\n", 2), Route::NotFound);
    }

    #[test]
    fn test_source_index_like_atoi() {
        assert_eq!(source_index("3", 8), Some(3));
        assert_eq!(source_index("3abc", 8), Some(3));
        assert_eq!(source_index("abc", 8), Some(0));
        assert_eq!(source_index("", 8), Some(0));
        assert_eq!(source_index("-0", 8), Some(0));
        assert_eq!(source_index("-2", 8), None);
        assert_eq!(source_index("99999999999999999999999", 8), None);
        assert_eq!(source_index("0", 0), None);
    }

    #[test]
    fn test_auth_required() {
        let router = Router::new(None, Some(encode_secret("user:pass")));

        assert_eq!(route(&router, "GET /stream/0 HTTP/1.0\r\n\r\n", 1), Route::AuthRequired);
        assert_eq!(route(&router, "GET /still/0 HTTP/1.0\r\n\r\n", 1), Route::AuthRequired);
        assert_eq!(
            route(
                &router,
                "GET /stream/0 HTTP/1.0\r\nAuthorization: Basic dXNlcjpwYXNz\r\n\r\n",
                1
            ),
            Route::Stream { source: 0 }
        );
        // Public prefix skips the check and falls through to static files
        assert_eq!(route(&router, "GET /img/logo.png HTTP/1.0\r\n\r\n", 1), Route::NotFound);
    }

    #[test]
    fn test_public_prefix_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::create_dir(root.join("img")).unwrap();
        std::fs::write(root.join("img/logo.png"), "png").unwrap();
        std::fs::write(root.join("private.html"), "<p>keys</p>").unwrap();

        let router = Router::new(Some(root), Some(encode_secret("user:pass")));

        assert!(matches!(
            route(&router, "GET /img/logo.png HTTP/1.0\r\n\r\n", 1),
            Route::StaticFile { content_type: "image/png", .. }
        ));
        assert_eq!(route(&router, "GET /private.html HTTP/1.0\r\n\r\n", 1), Route::AuthRequired);
        for raw in [
            "GET /img/../private.html HTTP/1.0\r\n\r\n",
            "GET /img/./../private.html HTTP/1.0\r\n\r\n",
            "GET /img/x/../../private.html HTTP/1.0\r\n\r\n",
        ] {
            assert_eq!(route(&router, raw, 1), Route::AuthRequired, "{}", raw);
        }
        // Authorized clients may still use such paths
        let raw = "GET /img/../private.html HTTP/1.0\r\nAuthorization: Basic dXNlcjpwYXNz\r\n\r\n";
        assert!(matches!(
            route(&router, raw, 1),
            Route::StaticFile { content_length: 11, .. }
        ));
    }

    #[test]
    fn test_is_public() {
        assert!(Router::is_public("/img/logo.png"));
        assert!(Router::is_public("/img/a/b..c.png"));
        assert!(!Router::is_public("/img"));
        assert!(!Router::is_public("/img/../index.html"));
        assert!(!Router::is_public("/stream/0"));
    }

    #[test]
    fn test_static_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("index.html"), "<html></html>").unwrap();
        std::fs::create_dir(root.join("css")).unwrap();
        std::fs::write(root.join("css/site.css"), "body{}").unwrap();

        let router = Router::new(Some(root.clone()), None);

        match route(&router, "GET / HTTP/1.1\r\n\r\n", 1) {
            Route::StaticFile {
                path,
                content_length,
                content_type,
            } => {
                assert_eq!(path, root.join("index.html"));
                assert_eq!(content_length, 13);
                assert_eq!(content_type, "text/html");
            }
            other => panic!("unexpected route {:?}", other),
        }

        assert!(matches!(
            route(&router, "GET /css/site.css HTTP/1.1\r\n\r\n", 1),
            Route::StaticFile { content_type: "text/css", .. }
        ));
        // Directories without trailing slash are not files
        assert_eq!(route(&router, "GET /css HTTP/1.1\r\n\r\n", 1), Route::NotFound);
        assert_eq!(route(&router, "GET /missing.html HTTP/1.1\r\n\r\n", 1), Route::NotFound);
    }

    #[test]
    fn test_authorized_static_index() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        std::fs::write(root.join("index.html"), "<p>hello</p>").unwrap();

        let router = Router::new(Some(root), Some(encode_secret("admin:hunter2")));
        let raw = format!(
            "GET / HTTP/1.1\r\nAuthorization: Basic {}\r\n\r\n",
            encode_secret("admin:hunter2")
        );

        assert!(matches!(
            route(&router, &raw, 1),
            Route::StaticFile { content_length: 12, content_type: "text/html", .. }
        ));
        assert_eq!(route(&router, "GET / HTTP/1.1\r\n\r\n", 1), Route::AuthRequired);
    }

    #[test]
    fn test_traversal_rejected() {
        let parent = tempfile::tempdir().unwrap();
        let parent_path = parent.path().canonicalize().unwrap();
        let root = parent_path.join("www");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(parent_path.join("secret.txt"), "secret").unwrap();
        std::fs::create_dir(parent_path.join("www2")).unwrap();
        std::fs::write(parent_path.join("www2/other.txt"), "other").unwrap();

        let router = Router::new(Some(root), None);

        for raw in [
            "GET /../secret.txt HTTP/1.1\r\n\r\n",
            "GET /./../secret.txt HTTP/1.1\r\n\r\n",
            "GET /../www2/other.txt HTTP/1.1\r\n\r\n",
        ] {
            assert_eq!(route(&router, raw, 1), Route::NotFound, "{}", raw);
            // Same answer every time
            assert_eq!(route(&router, raw, 1), Route::NotFound, "{}", raw);
        }
    }

    #[test]
    fn test_no_static_root() {
        let router = Router::default();
        assert_eq!(route(&router, "GET /index.html HTTP/1.0\r\n\r\n", 1), Route::NotFound);
    }
}
