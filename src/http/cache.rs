//! HTTP cache control module
//!
//! `ETag` generation, conditional request checks, HTTP dates and the
//! long-lived cache policy for immutable assets.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Path segment marking build-hashed, immutable assets
pub const IMMUTABLE_SEGMENT: &str = "/static/";

/// Ten years, in seconds
pub const IMMUTABLE_MAX_AGE: u64 = 315_360_000;

/// Cache-Control value for immutable assets
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, immutable, max-age=315360000";

const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Whether a request path addresses an immutable asset
pub fn is_immutable_path(path: &str) -> bool {
    path.contains(IMMUTABLE_SEGMENT)
}

/// Generate `ETag` using fast hashing
///
/// # Returns
/// Quoted `ETag` string, e.g., `"abc123def"`
pub fn generate_etag(content: &[u8]) -> String {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    let v = hasher.finish();
    format!("\"{v:x}\"")
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Supports:
/// - Single `ETag`: `"abc123"`
/// - Multiple `ETags`: `"abc123", "def456"`
/// - Wildcard: `*`
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    if_none_match.is_some_and(|client_etag| {
        client_etag
            .split(',')
            .any(|e| e.trim() == etag || e.trim() == "*")
    })
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format(HTTP_DATE_FORMAT).to_string()
}

/// Parse an IMF-fixdate header value
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), HTTP_DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Check whether the resource is unchanged since the client's copy
///
/// An epoch modification time means "unknown" and never matches.
/// Comparison uses whole seconds, the resolution of HTTP dates.
pub fn check_not_modified(if_modified_since: Option<&str>, modified: DateTime<Utc>) -> bool {
    if modified == DateTime::<Utc>::UNIX_EPOCH {
        return false;
    }
    if_modified_since
        .and_then(parse_http_date)
        .is_some_and(|since| modified.timestamp() <= since.timestamp())
}
