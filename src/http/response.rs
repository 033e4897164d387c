use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use serde::Serialize;

use crate::fs::stream::ByteStream;
use crate::http::mime;

/// HTTP status code.
///
/// Common codes have named variants; anything else in `100..=999` is carried
/// as [`StatusCode::Other`]. Equality and hashing go by the numeric code, so
/// `Other(404)` equals `NotFound`.
#[derive(Debug, Clone, Copy)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 201 Created
    Created,
    /// 202 Accepted
    Accepted,
    /// 204 No Content
    NoContent,
    /// 400 Bad Request
    BadRequest,
    /// 401 Unauthorized
    Unauthorized,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 405 Method Not Allowed
    MethodNotAllowed,
    /// 409 Conflict
    Conflict,
    /// 422 Unprocessable Entity
    UnprocessableEntity,
    /// 500 Internal Server Error
    InternalServerError,
    /// 503 Service Unavailable
    ServiceUnavailable,
    /// Any other three-digit code
    Other(u16),
}

const NAMED: [StatusCode; 13] = [
    StatusCode::Ok,
    StatusCode::Created,
    StatusCode::Accepted,
    StatusCode::NoContent,
    StatusCode::BadRequest,
    StatusCode::Unauthorized,
    StatusCode::Forbidden,
    StatusCode::NotFound,
    StatusCode::MethodNotAllowed,
    StatusCode::Conflict,
    StatusCode::UnprocessableEntity,
    StatusCode::InternalServerError,
    StatusCode::ServiceUnavailable,
];

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use pathguard::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::Created => 201,
            StatusCode::Accepted => 202,
            StatusCode::NoContent => 204,
            StatusCode::BadRequest => 400,
            StatusCode::Unauthorized => 401,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::MethodNotAllowed => 405,
            StatusCode::Conflict => 409,
            StatusCode::UnprocessableEntity => 422,
            StatusCode::InternalServerError => 500,
            StatusCode::ServiceUnavailable => 503,
            StatusCode::Other(code) => *code,
        }
    }

    /// Any three-digit code; named variants are preferred when one exists.
    pub fn from_u16(code: u16) -> Option<Self> {
        if !(100..=999).contains(&code) {
            return None;
        }
        let named = NAMED.iter().find(|status| status.as_u16() == code);
        Some(named.copied().unwrap_or(StatusCode::Other(code)))
    }

    /// Returns the standard HTTP reason phrase, if the code has one.
    ///
    /// # Example
    ///
    /// ```
    /// # use pathguard::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), Some("OK"));
    /// assert_eq!(StatusCode::Other(302).reason_phrase(), Some("Found"));
    /// assert_eq!(StatusCode::Other(299).reason_phrase(), None);
    /// ```
    pub fn reason_phrase(&self) -> Option<&'static str> {
        let phrase = match self.as_u16() {
            100 => "Continue",
            101 => "Switching Protocols",
            200 => "OK",
            201 => "Created",
            202 => "Accepted",
            204 => "No Content",
            206 => "Partial Content",
            301 => "Moved Permanently",
            302 => "Found",
            303 => "See Other",
            304 => "Not Modified",
            307 => "Temporary Redirect",
            308 => "Permanent Redirect",
            400 => "Bad Request",
            401 => "Unauthorized",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            406 => "Not Acceptable",
            408 => "Request Timeout",
            409 => "Conflict",
            410 => "Gone",
            413 => "Payload Too Large",
            415 => "Unsupported Media Type",
            418 => "I'm a teapot",
            422 => "Unprocessable Entity",
            429 => "Too Many Requests",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            502 => "Bad Gateway",
            503 => "Service Unavailable",
            504 => "Gateway Timeout",
            _ => return None,
        };
        Some(phrase)
    }
}

impl PartialEq for StatusCode {
    fn eq(&self, other: &Self) -> bool {
        self.as_u16() == other.as_u16()
    }
}

impl Eq for StatusCode {}

impl std::hash::Hash for StatusCode {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_u16().hash(state);
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason_phrase() {
            Some(phrase) => write!(f, "{} {}", self.as_u16(), phrase),
            None => write!(f, "{}", self.as_u16()),
        }
    }
}

/// Where a response body comes from.
pub enum Body {
    /// No body
    Empty,
    /// Literal payload, written in one piece
    Bytes(Bytes),
    /// File on disk, streamed when the status is 200
    File(PathBuf),
    /// Generator of chunks with no known total length
    Stream(ByteStream),
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            Body::File(path) => f.debug_tuple("File").field(path).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Resolved outcome for one request, independent of how it is transmitted.
#[derive(Debug)]
pub struct ResponseDescriptor {
    /// The HTTP status code
    pub status: StatusCode,
    /// `Content-Type` header, omitted when `None`
    pub content_type: Option<String>,
    /// Body source
    pub body: Body,
    /// Extra headers, e.g. `Access-Control-Allow-Origin`
    pub headers: HashMap<String, String>,
}

/// Builder for constructing response descriptors in a fluent style.
///
/// # Example
///
/// ```ignore
/// let response = ResponseBuilder::new(StatusCode::Ok)
///     .content_type("application/json")
///     .body(b"{}".to_vec())
///     .build();
/// ```
pub struct ResponseBuilder {
    status: StatusCode,
    content_type: Option<String>,
    headers: HashMap<String, String>,
    body: Body,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: None,
            headers: HashMap::new(),
            body: Body::Empty,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Adds or replaces an extra header.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Sets a literal body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Body::Bytes(body.into());
        self
    }

    /// Sets a generated body of unknown length.
    pub fn stream(mut self, stream: ByteStream) -> Self {
        self.body = Body::Stream(stream);
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.body = Body::File(path.into());
        self
    }

    pub fn build(self) -> ResponseDescriptor {
        ResponseDescriptor {
            status: self.status,
            content_type: self.content_type,
            body: self.body,
            headers: self.headers,
        }
    }
}

impl ResponseDescriptor {
    /// A 200 response streaming `path` from disk.
    pub fn asset(path: impl Into<PathBuf>, content_type: Option<&str>) -> Self {
        let mut builder = ResponseBuilder::new(StatusCode::Ok).file(path);
        if let Some(content_type) = content_type {
            builder = builder.content_type(content_type);
        }
        builder.build()
    }

    /// Creates a simple 200 OK plain-text response with the given body.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        ResponseBuilder::new(StatusCode::Ok)
            .content_type(mime::TEXT_PLAIN)
            .body(body)
            .build()
    }

    /// Serializes `value` as a JSON body.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> serde_json::Result<Self> {
        let body = serde_json::to_vec(value)?;
        Ok(ResponseBuilder::new(status)
            .content_type(mime::APPLICATION_JSON)
            .body(body)
            .build())
    }

    /// Creates the 404 Not Found response for missing assets.
    pub fn not_found() -> Self {
        ResponseBuilder::new(StatusCode::NotFound)
            .content_type(mime::TEXT_PLAIN)
            .body(&b"404 not found"[..])
            .build()
    }

    /// Creates a 500 Internal Server Error response.
    pub fn internal_error() -> Self {
        ResponseBuilder::new(StatusCode::InternalServerError)
            .content_type(mime::TEXT_PLAIN)
            .body(&b"500 Internal Server Error"[..])
            .build()
    }
}
