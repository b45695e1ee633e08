//! Wire-level constants
//!
//! These strings are part of the external contract: existing viewers parse
//! the multipart boundary and the canned bodies byte for byte.

/// Multipart boundary token separating stream parts
pub const BOUNDARY: &str = "aEjlw7DR5wcqrxG4p12AE0jGIZPlUHyi";

/// Value of the `Server` response header
pub const SERVER_NAME: &str = "hawkeye";

/// Realm announced with `WWW-Authenticate`
pub const AUTH_REALM: &str = "Hawkeye";

/// Part header prepended to every stored frame
pub const FRAME_HEADER: &str = "Content-Type: image/jpeg\r\n\r\n";

/// Boundary footer appended to every stored frame
pub const FRAME_FOOTER: &str = "\r\n--aEjlw7DR5wcqrxG4p12AE0jGIZPlUHyi\r\n";

/// Opening boundary sent once after the stream response headers
pub const STREAM_PREAMBLE: &str = "--aEjlw7DR5wcqrxG4p12AE0jGIZPlUHyi\r\n";

/// `Cache-Control` value for streams and the info document
pub const NO_CACHE_REVALIDATE: &str =
    "no-store, no-cache, must-revalidate, pre-check=0, post-check=0, max-age=0";

/// `Cache-Control` value for still images
pub const NO_CACHE: &str = "no-store, no-cache, pre-check=0, post-check=0, max-age=0";

/// `Expires` value forcing clients to treat responses as stale
pub const EXPIRES_IN_PAST: &str = "Mon, 1 Jan 2000 00:00:00 GMT";

/// Content type of the canned error bodies
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Body of the 400 response
pub const BAD_REQUEST_BODY: &str = "Bad request";

/// Body of the 401 response
pub const AUTH_REQUIRED_BODY: &str = "Password required.";

/// Body of the 404 response
pub const NOT_FOUND_BODY: &str = "Could not find resource at this URL.";

/// Document served for directory-like static paths
pub const INDEX_FILE_NAME: &str = "index.html";

/// Route returning the JSON stream description
pub const STREAM_INFO_PATH: &str = "/stream/info";

/// Prefix of live multipart streams (`/stream/<index>`)
pub const STREAM_PREFIX: &str = "/stream/";

/// Prefix of single still images (`/still/<index>`)
pub const STILL_PREFIX: &str = "/still/";

/// Static prefix served without authorization
pub const PUBLIC_PREFIX: &str = "/img/";

/// Default number of frames kept per source
pub const DEFAULT_FRAME_BUFFER_LEN: usize = 8;

/// Largest JPEG payload a frame store accepts
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Bound of the per-session request header buffer
pub const MAX_REQUEST_HEADER_SIZE: usize = 4096;

/// Size of socket reads and static-file chunks
pub const SERVER_BUFFER_SIZE: usize = 16 * 1024;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;
