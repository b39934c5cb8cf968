//! HTTP/1.x server substrate for pollbox
//!
//! This module provides the blocking HTTP layer: header map, message types,
//! an incremental request parser, body framing, and the per-connection
//! request/response cycle.
//!
//! # Architecture
//!
//! All I/O goes through a transport abstraction:
//!
//! - `TransportOps` defines the operations (poll, read, write, close)
//! - `TcpTransport` implements them over a plain TCP stream
//! - The parser and framer are transport-agnostic byte-level components
//!
//! Each accepted connection serves exactly one request/response cycle; there
//! is no keep-alive pipelining.

pub mod conn;
pub mod headers;
pub mod message;
pub mod parser;
pub mod stream;
pub mod transport;

pub use conn::HttpConn;
pub use headers::Headers;
pub use message::{Method, Request, RequestHead, Response, Status};
pub use parser::RequestParser;
pub use stream::{EofReader, FixedLenReader, FixedLenWriter};
pub use transport::{TcpTransport, TransportOps};

/// Result type for HTTP operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// End-of-stream before any request byte: a normal idle-connection
    /// close, not a protocol failure.
    #[error("connection closed before a request was sent")]
    NoMessage,

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid header: {0}")]
    InvalidHeader(String),

    #[error("chunked transfer encoding is not supported")]
    ChunkedUnsupported,

    #[error("response body exceeds declared length of {0} bytes")]
    BodyOverflow(u64),

    #[error("incomplete message")]
    Incomplete,

    #[error("timeout")]
    Timeout,

    #[error("connection closed")]
    ConnectionClosed,
}

/// Maximum number of headers per message
pub const MAX_HEADERS: usize = 64;

/// CRLF line ending
pub const CRLF: &str = "\r\n";
