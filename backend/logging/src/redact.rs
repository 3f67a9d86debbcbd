//! Stream URL redaction
//!
//! Playback URLs routinely carry signatures and session tokens in their query
//! string. Only scheme, host and path are kept for log output.

use regex::Regex;
use std::sync::LazyLock;

static QUERY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?#].*$").unwrap());
static USERINFO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-zA-Z][a-zA-Z0-9+.-]*://)[^/@]+@").unwrap());

/// Redacts credentials and query parameters from a stream URL.
pub fn redact_stream_url(url: &str) -> String {
    let without_user = USERINFO_RE.replace(url, "${1}[REDACTED]@");
    if QUERY_RE.is_match(&without_user) {
        QUERY_RE.replace(&without_user, "?[REDACTED]").to_string()
    } else {
        without_user.to_string()
    }
}
