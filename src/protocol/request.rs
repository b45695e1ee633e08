//! HTTP/1.x request head parser
//!
//! Parses only what routing needs: the request line plus the `Host` and
//! `Authorization` headers. Works over an immutable byte slice; fields
//! borrow from it except where obsolete line folding forced a copy.
//!
//! ```text
//! GET /stream/0?x=1 HTTP/1.0\r\n        method  path     query protocol/version
//! Host: cam.local\r\n                   host
//! Authorization: Basic dXNlcjpwYXNz\r\n authorization
//!   (continuation lines are appended to the previous line)
//! \r\n
//! ```

use std::borrow::Cow;
use std::ops::Range;

/// Header block terminator
const HEAD_TERMINATOR: &[u8] = b"\r\n\r\n";

/// A parsed request head
///
/// The parser never fails. Missing pieces are empty strings or `None`; a
/// request without a protocol version is malformed and must be answered
/// with 400.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request<'a> {
    /// Request method (`GET`)
    pub method: Cow<'a, str>,
    /// Path without query string
    pub path: Cow<'a, str>,
    /// Query string without the `?`, empty when absent
    pub query: Cow<'a, str>,
    /// Protocol token (`HTTP`)
    pub protocol: Cow<'a, str>,
    /// Protocol version (`1.1`), `None` when it could not be extracted
    pub version: Option<Cow<'a, str>>,
    /// `Host` header value
    pub host: Option<Cow<'a, str>>,
    /// `Authorization` header value
    pub authorization: Option<Cow<'a, str>>,
}

impl<'a> Request<'a> {
    /// Parse a header block
    ///
    /// Everything after the first blank line is ignored. Bytes that are not
    /// valid UTF-8 yield an empty (malformed) request.
    pub fn parse(buf: &'a [u8]) -> Self {
        let head = match find_head_end(buf) {
            Some(end) => &buf[..end],
            None => buf,
        };

        let Ok(head) = std::str::from_utf8(head) else {
            return Self::default();
        };

        let mut lines = logical_lines(head).into_iter();
        let mut request = match lines.next() {
            Some(line) => Self::from_request_line(line),
            None => return Self::default(),
        };

        for line in lines {
            extract_header(&line, "host:", &mut request.host);
            extract_header(&line, "authorization:", &mut request.authorization);
        }

        request
    }

    /// Whether the request line carried a protocol version
    pub fn is_well_formed(&self) -> bool {
        self.version.is_some()
    }

    /// Path plus `?query` when a query is present, for logging
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            self.path.to_string()
        } else {
            format!("{}?{}", self.path, self.query)
        }
    }

    fn from_request_line(line: Cow<'a, str>) -> Self {
        let tokens = RequestLine::tokenize(&line);
        let field = |range: Range<usize>| sub(&line, range);

        Self {
            method: field(tokens.method),
            path: field(tokens.path),
            query: field(tokens.query),
            protocol: field(tokens.protocol),
            version: tokens.version.map(field),
            host: None,
            authorization: None,
        }
    }
}

/// Position of the blank line ending a header block, if present
///
/// The returned index points at the `\r\n\r\n`; the head is `buf[..index]`.
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HEAD_TERMINATOR.len())
        .position(|w| w == HEAD_TERMINATOR)
}

/// Byte ranges of the request-line tokens
#[derive(Debug, Default)]
struct RequestLine {
    method: Range<usize>,
    path: Range<usize>,
    query: Range<usize>,
    protocol: Range<usize>,
    version: Option<Range<usize>>,
}

impl RequestLine {
    fn tokenize(line: &str) -> Self {
        let b = line.as_bytes();
        let mut out = RequestLine::default();

        let Some(method_end) = b.iter().position(|&c| is_lws(c)) else {
            out.method = 0..b.len();
            return out;
        };
        out.method = 0..method_end;

        let path_start = skip_lws(b, method_end);
        let Some(offset) = b[path_start..]
            .iter()
            .position(|&c| is_lws(c) || c == b'?')
        else {
            out.path = path_start..b.len();
            return out;
        };
        let path_end = path_start + offset;
        out.path = path_start..path_end;

        let mut cursor = path_end;
        if b[path_end] == b'?' {
            let query_start = skip_lws(b, path_end + 1);
            match b[query_start..].iter().position(|&c| is_lws(c)) {
                Some(offset) => {
                    out.query = query_start..query_start + offset;
                    cursor = query_start + offset;
                }
                None => {
                    out.query = query_start..b.len();
                    return out;
                }
            }
        }

        let protocol_start = skip_lws(b, cursor);
        match b[protocol_start..].iter().position(|&c| c == b'/') {
            Some(offset) => {
                let slash = protocol_start + offset;
                out.protocol = protocol_start..slash;
                out.version = Some(trim_range(b, slash + 1..b.len()));
            }
            None => {
                out.protocol = trim_range(b, protocol_start..b.len());
            }
        }

        out
    }
}

/// Split a head into logical lines, merging folded continuation lines
///
/// A line starting with a space or tab is appended to the previous one with
/// its leading whitespace removed. Unfolded lines stay borrowed.
fn logical_lines(head: &str) -> Vec<Cow<'_, str>> {
    let mut lines: Vec<Cow<'_, str>> = Vec::new();

    for raw in head.split("\r\n") {
        if raw.starts_with([' ', '\t']) {
            if let Some(prev) = lines.last_mut() {
                prev.to_mut().push_str(raw.trim_start_matches([' ', '\t']));
                continue;
            }
        }
        lines.push(Cow::Borrowed(raw));
    }

    lines
}

/// Set `value` from `line` if it starts with `name` (case-insensitive) and
/// no earlier line matched
fn extract_header<'a>(line: &Cow<'a, str>, name: &str, value: &mut Option<Cow<'a, str>>) {
    if value.is_some() {
        return;
    }

    let b = line.as_bytes();
    if b.len() >= name.len() && b[..name.len()].eq_ignore_ascii_case(name.as_bytes()) {
        *value = Some(sub(line, trim_range(b, name.len()..b.len())));
    }
}

/// Sub-slice of a possibly owned line, borrowing when the line is borrowed
fn sub<'a>(line: &Cow<'a, str>, range: Range<usize>) -> Cow<'a, str> {
    match line {
        Cow::Borrowed(s) => Cow::Borrowed(&s[range]),
        Cow::Owned(s) => Cow::Owned(s[range].to_owned()),
    }
}

fn is_lws(c: u8) -> bool {
    c == b' ' || c == b'\t'
}

fn is_blank(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0)
}

fn skip_lws(b: &[u8], mut i: usize) -> usize {
    while i < b.len() && is_lws(b[i]) {
        i += 1;
    }
    i
}

fn trim_range(b: &[u8], range: Range<usize>) -> Range<usize> {
    let (mut start, mut end) = (range.start, range.end);
    while start < end && is_blank(b[start]) {
        start += 1;
    }
    while end > start && is_blank(b[end - 1]) {
        end -= 1;
    }
    start..end
}
