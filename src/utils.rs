//! Small helpers used across the crate.
//!
//! - URL validation for caller-supplied source addresses
//! - String truncation and whitespace collapsing for logs and prompts
//! - HTTP date formatting for cookies
//! - Base64 payload decoding for code-hosting API content

use crate::error::{Error, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use itertools::Itertools;
use url::Url;

/// Validate a caller-supplied source URL.
///
/// The URL must be absolute, use `http` or `https`, and name a host.
/// Anything else is rejected with [`Error::InvalidInput`] before any network
/// access happens.
///
/// # Examples
///
/// ```ignore
/// assert!(parse_source_url("https://example.com/a").is_ok());
/// assert!(parse_source_url("not-a-url").is_err());
/// ```
pub fn parse_source_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::invalid("url parameter is required"));
    }

    let url = Url::parse(raw).map_err(|e| Error::invalid(format!("url is invalid: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::invalid(format!(
            "url scheme must be http or https, got {}",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::invalid("url must include a host"));
    }
    Ok(url)
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a byte count
/// appended. Cuts always land on a character boundary.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        None => s.to_string(),
        Some((cut, _)) => format!("{}…(+{} bytes)", &s[..cut], s.len() - cut),
    }
}

/// Collapse every run of whitespace into a single space.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().join(" ")
}

/// Format a timestamp as an RFC 7231 HTTP date (`Sun, 06 Nov 1994 08:49:37 GMT`).
pub fn http_date(at: DateTime<Utc>) -> String {
    at.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Decode a base64 payload into text.
///
/// Code-hosting APIs wrap encoded content at 60 or 76 columns, so all
/// whitespace is removed before decoding. Invalid UTF-8 is replaced rather than
/// rejected.
pub fn decode_base64_text(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| Error::Parse {
        what: "base64 content",
        detail: e.to_string(),
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_multibyte() {
        let s = "日本語のテキスト";
        let result = truncate_for_log(s, 3);
        assert!(result.starts_with("日本語"));
        assert!(result.contains("(+15 bytes)"));
    }

    #[test]
    fn test_parse_source_url_accepts_https() {
        let url = parse_source_url("https://www.infoq.com/news/2024/01/item/").unwrap();
        assert_eq!(url.host_str(), Some("www.infoq.com"));
    }

    #[test]
    fn test_parse_source_url_rejects_garbage() {
        for raw in ["", "   ", "not-a-url", "/relative/path", "ftp://example.com/x", "mailto:a@b.c"] {
            match parse_source_url(raw) {
                Err(Error::InvalidInput(_)) => {}
                other => panic!("expected InvalidInput for {raw:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  owner /\n\n   repo  "), "owner / repo");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_http_date() {
        let at = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
        assert_eq!(http_date(at), "Sun, 06 Nov 1994 08:49:37 GMT");
    }

    #[test]
    fn test_decode_base64_text_ignores_line_breaks() {
        // "# Hello\nWorld\n" split across lines the way the API returns it
        let encoded = "IyBIZWxs\nbwpXb3Js\nZAo=\n";
        assert_eq!(decode_base64_text(encoded).unwrap(), "# Hello\nWorld\n");
    }

    #[test]
    fn test_decode_base64_text_rejects_invalid() {
        assert!(matches!(
            decode_base64_text("!!!not base64!!!"),
            Err(Error::Parse { .. })
        ));
    }
}
