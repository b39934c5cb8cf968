//! HTTP message types
//!
//! This module defines the core types for HTTP requests and responses.

use super::{Headers, CRLF};
use std::fmt;

/// HTTP methods
///
/// The usual token set is modeled explicitly, but any token is accepted on
/// the wire: unrecognized tokens are carried verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Connect,
    Options,
    Trace,
    Other(String),
}

impl Method {
    /// Parse a method token. Never fails; unknown tokens become `Other`.
    pub fn from_token(s: &str) -> Self {
        match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "CONNECT" => Method::Connect,
            "OPTIONS" => Method::Options,
            "TRACE" => Method::Trace,
            _ => Method::Other(s.to_string()),
        }
    }

    /// Convert method to its wire token
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Connect => "CONNECT",
            Method::Options => "OPTIONS",
            Method::Trace => "TRACE",
            Method::Other(s) => s.as_str(),
        }
    }

    /// GET and HEAD requests never carry an implicit read-to-EOF body.
    pub fn body_is_bounded(&self) -> bool {
        matches!(self, Method::Get | Method::Head)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Status {
    code: u16,
}

impl Status {
    /// Create a status from a raw code. Codes outside 100..600 are clamped
    /// to 500 rather than rejected; the server only emits codes it owns.
    pub fn new(code: u16) -> Self {
        if (100..600).contains(&code) {
            Status { code }
        } else {
            Status { code: 500 }
        }
    }

    /// Get the status code
    pub fn code(&self) -> u16 {
        self.code
    }

    /// Get the canonical reason phrase for this status code
    pub fn reason_phrase(&self) -> &'static str {
        match self.code {
            200 => "OK",
            204 => "No Content",
            301 => "Moved Permanently",
            302 => "Found",
            304 => "Not Modified",
            400 => "Bad Request",
            403 => "Forbidden",
            404 => "Not Found",
            405 => "Method Not Allowed",
            409 => "Conflict",
            411 => "Length Required",
            500 => "Internal Server Error",
            501 => "Not Implemented",
            503 => "Service Unavailable",
            _ => "Unknown",
        }
    }

    /// Check if this is a success status (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.code)
    }

    /// Check if this is a client error status (4xx)
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.code)
    }

    /// Check if this is a server error status (5xx)
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.code)
    }

    // Common status codes as constants
    pub const OK: Status = Status { code: 200 };
    pub const BAD_REQUEST: Status = Status { code: 400 };
    pub const FORBIDDEN: Status = Status { code: 403 };
    pub const NOT_FOUND: Status = Status { code: 404 };
    pub const CONFLICT: Status = Status { code: 409 };
    pub const INTERNAL_SERVER_ERROR: Status = Status { code: 500 };
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.reason_phrase())
    }
}

/// Parsed request head: start line plus header block.
///
/// The URI is kept raw and unsplit; the query string belongs to the
/// dispatcher, not the message layer. `content_length` of `None` means the
/// request announced no length (and is not chunked).
#[derive(Debug, Clone)]
pub struct RequestHead {
    pub method: Method,
    pub uri: String,
    pub version: String,
    pub headers: Headers,
    pub content_length: Option<u64>,
    pub chunked: bool,
}

/// A fully received HTTP request
#[derive(Debug, Clone)]
pub struct Request {
    head: RequestHead,
    body: Vec<u8>,
}

impl Request {
    pub fn new(head: RequestHead, body: Vec<u8>) -> Self {
        Request { head, body }
    }

    pub fn method(&self) -> &Method {
        &self.head.method
    }

    pub fn uri(&self) -> &str {
        &self.head.uri
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        match self.head.uri.split_once('?') {
            Some((path, _)) => path,
            None => &self.head.uri,
        }
    }

    /// Query string, if any, without the leading `?`
    pub fn query(&self) -> Option<&str> {
        self.head.uri.split_once('?').map(|(_, q)| q)
    }

    pub fn version(&self) -> &str {
        &self.head.version
    }

    pub fn headers(&self) -> &Headers {
        &self.head.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn head(&self) -> &RequestHead {
        &self.head
    }
}

/// HTTP response under construction
#[derive(Debug, Clone)]
pub struct Response {
    status: Status,
    reason: String,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Create a new HTTP response with the canonical reason phrase
    pub fn new(status: Status) -> Self {
        Response {
            status,
            reason: status.reason_phrase().to_string(),
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Create a builder for constructing responses
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::default()
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn set_body(&mut self, body: Vec<u8>) {
        self.body = body;
    }

    /// Serialize the status line and header block, terminated by the blank
    /// line. The body is not included; it follows through the bounded body
    /// writer once the head has been flushed.
    pub fn head_to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(b"HTTP/1.1 ");
        buf.extend_from_slice(self.status.code().to_string().as_bytes());
        buf.push(b' ');
        buf.extend_from_slice(self.reason.as_bytes());
        buf.extend_from_slice(CRLF.as_bytes());

        for (name, value) in self.headers.iter() {
            buf.extend_from_slice(name.as_bytes());
            buf.extend_from_slice(b": ");
            buf.extend_from_slice(value.as_bytes());
            buf.extend_from_slice(CRLF.as_bytes());
        }

        buf.extend_from_slice(CRLF.as_bytes());
        buf
    }
}

/// Builder for HTTP responses
#[derive(Debug, Default)]
pub struct ResponseBuilder {
    status: Option<Status>,
    reason: Option<String>,
    headers: Headers,
    body: Vec<u8>,
}

impl ResponseBuilder {
    /// Set the status code
    pub fn status(mut self, status: Status) -> Self {
        self.status = Some(status);
        self
    }

    /// Set the reason phrase
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Add a header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Build the response
    pub fn build(self) -> Response {
        let status = self.status.unwrap_or(Status::OK);
        let reason = self
            .reason
            .unwrap_or_else(|| status.reason_phrase().to_string());
        Response {
            status,
            reason,
            headers: self.headers,
            body: self.body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_from_token() {
        assert_eq!(Method::from_token("GET"), Method::Get);
        assert_eq!(Method::from_token("POST"), Method::Post);
        assert_eq!(
            Method::from_token("BREW"),
            Method::Other("BREW".to_string())
        );
        assert_eq!(Method::from_token("BREW").as_str(), "BREW");
    }

    #[test]
    fn test_body_is_bounded() {
        assert!(Method::Get.body_is_bounded());
        assert!(Method::Head.body_is_bounded());
        assert!(!Method::Post.body_is_bounded());
        assert!(!Method::Other("BREW".into()).body_is_bounded());
    }

    #[test]
    fn test_status() {
        let status = Status::new(200);
        assert_eq!(status.code(), 200);
        assert_eq!(status.reason_phrase(), "OK");
        assert!(status.is_success());
        assert!(!status.is_client_error());

        // Out-of-range codes collapse to 500
        assert_eq!(Status::new(999).code(), 500);
    }

    #[test]
    fn test_request_path_query() {
        let head = RequestHead {
            method: Method::Get,
            uri: "/files/a.html?raw=1".to_string(),
            version: "HTTP/1.1".to_string(),
            headers: Headers::new(),
            content_length: None,
            chunked: false,
        };
        let req = Request::new(head, Vec::new());
        assert_eq!(req.path(), "/files/a.html");
        assert_eq!(req.query(), Some("raw=1"));
    }

    #[test]
    fn test_response_builder() {
        let resp = Response::builder()
            .status(Status::NOT_FOUND)
            .header("Content-Type", "text/plain")
            .body(b"Not Found".to_vec())
            .build();

        assert_eq!(resp.status().code(), 404);
        assert_eq!(resp.reason(), "Not Found");
        assert_eq!(resp.body(), b"Not Found");
    }

    #[test]
    fn test_head_to_wire() {
        let resp = Response::builder()
            .status(Status::OK)
            .header("Content-Length", "5")
            .build();

        let wire = String::from_utf8(resp.head_to_wire()).unwrap();
        assert!(wire.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(wire.contains("Content-Length: 5\r\n"));
        assert!(wire.ends_with("\r\n\r\n"));
    }
}
