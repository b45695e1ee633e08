//! HTTP Basic authorization
//!
//! The configured `user:pass` is base64-encoded once at startup. Requests
//! are authorized by comparing the whole token after `Basic` against it; the
//! token is never decoded.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

const BASIC_SCHEME: &str = "Basic";

/// Encode `user:pass` into the token clients will send
pub fn encode_secret(credentials: &str) -> String {
    STANDARD.encode(credentials)
}

/// Check an `Authorization` header value against the server secret
///
/// With no secret configured everyone is authorized.
pub fn check_basic_auth(authorization: Option<&str>, secret: Option<&str>) -> bool {
    let Some(secret) = secret else {
        return true;
    };
    let Some(auth) = authorization else {
        return false;
    };

    let b = auth.as_bytes();
    if b.len() < BASIC_SCHEME.len()
        || !b[..BASIC_SCHEME.len()].eq_ignore_ascii_case(BASIC_SCHEME.as_bytes())
    {
        return false;
    }

    let token = auth[BASIC_SCHEME.len()..].trim_start_matches([' ', '\t']);
    token == secret
}
