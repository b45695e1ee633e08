//! Response heads
//!
//! Responses are assembled from typed fields instead of string templates.
//! The rendered text must stay byte-identical to what existing viewers
//! expect: every head starts with the status line, `Server`, `Connection`
//! and `Access-Control-Allow-Origin`, followed by route-specific headers.

use bytes::{BufMut, Bytes, BytesMut};

use super::constants::*;

/// HTTP version written in the status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    Http10,
    Http11,
}

impl HttpVersion {
    fn as_str(&self) -> &'static str {
        match self {
            HttpVersion::Http10 => "HTTP/1.0",
            HttpVersion::Http11 => "HTTP/1.1",
        }
    }
}

/// Response status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    BadRequest,
    NotAuthorized,
    NotFound,
}

impl Status {
    /// Numeric status code
    pub fn code(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest => 400,
            Status::NotAuthorized => 401,
            Status::NotFound => 404,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "BAD REQUEST",
            Status::NotAuthorized => "NOT AUTHORIZED",
            Status::NotFound => "NOT FOUND",
        }
    }
}

/// A response status line plus headers
#[derive(Debug, Clone)]
pub struct ResponseHead {
    version: HttpVersion,
    status: Status,
    keep_alive: bool,
    headers: Vec<(&'static str, String)>,
}

impl ResponseHead {
    /// Create a head that closes the connection after the body
    pub fn new(version: HttpVersion, status: Status) -> Self {
        Self {
            version,
            status,
            keep_alive: false,
            headers: Vec::new(),
        }
    }

    /// Announce `Connection: keep-alive` instead of `close`
    pub fn keep_alive(mut self) -> Self {
        self.keep_alive = true;
        self
    }

    /// Append a header after the common ones
    pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    /// Append the no-cache header trio
    fn no_cache(self, cache_control: &'static str) -> Self {
        self.header("Cache-Control", cache_control)
            .header("Pragma", "no-cache")
            .header("Expires", EXPIRES_IN_PAST)
    }

    /// Status of this response
    pub fn status(&self) -> Status {
        self.status
    }

    /// Render the head, including the blank line that ends it
    pub fn write_to(&self, buf: &mut BytesMut) {
        let connection = if self.keep_alive { "keep-alive" } else { "close" };

        put_line(buf, &format!("{} {} {}", self.version.as_str(), self.status.code(), self.status.reason()));
        put_line(buf, &format!("Server: {}", SERVER_NAME));
        put_line(buf, &format!("Connection: {}", connection));
        put_line(buf, "Access-Control-Allow-Origin: *");
        for (name, value) in &self.headers {
            put_line(buf, &format!("{}: {}", name, value));
        }
        buf.put_slice(b"\r\n");
    }

    /// Render the head alone
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(256);
        self.write_to(&mut buf);
        buf.freeze()
    }

    /// Render the head followed by a body
    pub fn with_body(&self, body: &[u8]) -> Bytes {
        let mut buf = BytesMut::with_capacity(256 + body.len());
        self.write_to(&mut buf);
        buf.put_slice(body);
        buf.freeze()
    }
}

fn put_line(buf: &mut BytesMut, line: &str) {
    buf.put_slice(line.as_bytes());
    buf.put_slice(b"\r\n");
}

/// Head of a multipart stream, followed by the opening boundary
pub fn stream_header() -> Bytes {
    ResponseHead::new(HttpVersion::Http10, Status::Ok)
        .header(
            "Content-Type",
            format!("multipart/x-mixed-replace;boundary={}", BOUNDARY),
        )
        .no_cache(NO_CACHE_REVALIDATE)
        .with_body(STREAM_PREAMBLE.as_bytes())
}

/// Head of a single still JPEG
pub fn still_header() -> Bytes {
    ResponseHead::new(HttpVersion::Http10, Status::Ok)
        .header("Content-Type", "image/jpeg")
        .no_cache(NO_CACHE)
        .to_bytes()
}

/// Complete stream-info response
pub fn stream_info(stream_count: usize, width: u32, height: u32) -> Bytes {
    let body = format!(
        "{{\"stream_count\": {}, \"width\": {}, \"height\": {}}}",
        stream_count, width, height
    );
    ResponseHead::new(HttpVersion::Http10, Status::Ok)
        .header("Content-Type", "application/json")
        .no_cache(NO_CACHE_REVALIDATE)
        .with_body(body.as_bytes())
}

/// Head of a static file response
pub fn static_file_header(content_length: u64, content_type: &str) -> Bytes {
    ResponseHead::new(HttpVersion::Http11, Status::Ok)
        .keep_alive()
        .header("Content-Length", content_length.to_string())
        .header("Content-Type", content_type)
        .to_bytes()
}

/// Complete 400 response
pub fn bad_request() -> Bytes {
    ResponseHead::new(HttpVersion::Http11, Status::BadRequest)
        .header("Content-Type", HTML_CONTENT_TYPE)
        .with_body(BAD_REQUEST_BODY.as_bytes())
}

/// Complete 401 response
pub fn auth_required() -> Bytes {
    ResponseHead::new(HttpVersion::Http11, Status::NotAuthorized)
        .header("WWW-Authenticate", format!("Basic realm=\"{}\"", AUTH_REALM))
        .header("Content-Type", HTML_CONTENT_TYPE)
        .with_body(AUTH_REQUIRED_BODY.as_bytes())
}

/// Complete 404 response
pub fn not_found() -> Bytes {
    ResponseHead::new(HttpVersion::Http11, Status::NotFound)
        .header("Content-Type", HTML_CONTENT_TYPE)
        .with_body(NOT_FOUND_BODY.as_bytes())
}
