use std::collections::HashMap;

use bytes::Bytes;
use url::Url;

use crate::http::request::{Method, Request};

/// Base for resolving origin-form targets (`/a/b?c`) into path and query.
const ORIGIN: &str = "http://localhost/";

#[derive(Debug)]
pub enum ParseError {
    InvalidRequest,
    InvalidMethod,
    InvalidTarget,
    InvalidHeader,
    InvalidContentLength,
    Incomplete,
}

/// Parses one request from the front of `buf`.
///
/// Returns the request head, its body, and how many bytes of `buf` were used.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, Bytes, usize), ParseError> {
    // Look for header/body separator
    let headers_end = find_headers_end(buf).ok_or(ParseError::Incomplete)?;
    let header_bytes = &buf[..headers_end];
    let body_bytes = &buf[headers_end + 4..];

    let headers_str = std::str::from_utf8(header_bytes).map_err(|_| ParseError::InvalidRequest)?;

    let mut lines = headers_str.split("\r\n");

    // Request line
    let request_line = lines.next().ok_or(ParseError::InvalidRequest)?;
    let mut parts = request_line.split_whitespace();

    let method_str = parts.next().ok_or(ParseError::InvalidRequest)?;
    let target = parts.next().ok_or(ParseError::InvalidRequest)?;
    let version = parts.next().ok_or(ParseError::InvalidRequest)?;

    let method = Method::from_str(method_str).ok_or(ParseError::InvalidMethod)?;
    let (path, query) = split_target(target)?;

    // Headers
    let mut headers = HashMap::new();

    for line in lines {
        if line.is_empty() {
            continue;
        }

        let (key, value) = line.split_once(':').ok_or(ParseError::InvalidHeader)?;

        headers.insert(key.trim().to_string(), value.trim().to_string());
    }

    let request = Request {
        method,
        path,
        query,
        version: version.to_string(),
        headers,
    };

    // Body
    let content_length = request
        .header("Content-Length")
        .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
        .transpose()?
        .unwrap_or(0);

    if body_bytes.len() < content_length {
        return Err(ParseError::Incomplete);
    }

    let body = Bytes::copy_from_slice(&body_bytes[..content_length]);

    let total_consumed = headers_end + 4 + content_length;
    Ok((request, body, total_consumed))
}

/// Splits a request target into its path and optional query, the way a URL
/// parser sees them: dot segments are resolved and the path is never empty.
pub fn split_target(target: &str) -> Result<(String, Option<String>), ParseError> {
    let url = Url::parse(ORIGIN)
        .and_then(|base| base.join(target))
        .map_err(|_| ParseError::InvalidTarget)?;
    Ok((url.path().to_string(), url.query().map(str::to_owned)))
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, body, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("Host").unwrap(), "example.com");
        assert!(body.is_empty());
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn dot_segments_cannot_escape_root() {
        let (path, query) = split_target("/../../etc/passwd?x=1").unwrap();
        assert_eq!(path, "/etc/passwd");
        assert_eq!(query.as_deref(), Some("x=1"));
    }
}
