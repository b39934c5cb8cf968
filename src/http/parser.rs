//! HTTP request-head parsing
//!
//! Incremental push parser for the request start line and header block.
//! Feed it raw bytes as they arrive; it yields a [`RequestHead`] once the
//! blank line terminating the header block has been seen. Body bytes are not
//! consumed here; whatever the parser over-read stays available through
//! [`RequestParser::take_remaining`].

use super::{Error, Headers, Method, RequestHead, Result};
use bytes::{Buf, BytesMut};

/// Find the next LF in a buffer
fn find_lf(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Parse an HTTP request line.
///
/// The first three whitespace-delimited tokens are method, URI and version;
/// anything after the version token is discarded. Runs of interior
/// whitespace are tolerated.
pub fn parse_request_line(line: &str) -> Result<(Method, String, String)> {
    let mut tokens = line.split_whitespace();

    let method = tokens
        .next()
        .ok_or_else(|| Error::Parse("invalid request header".to_string()))?;
    let uri = tokens
        .next()
        .ok_or_else(|| Error::Parse(format!("request line has no URI: {:?}", line)))?;
    let version = tokens
        .next()
        .ok_or_else(|| Error::Parse(format!("request line has no version: {:?}", line)))?;

    Ok((
        Method::from_token(method),
        uri.to_string(),
        version.to_string(),
    ))
}

/// HTTP request-head parser
pub struct RequestParser {
    state: ParserState,
    buffer: BytesMut,
    bytes_seen: usize,
    method: Option<Method>,
    uri: Option<String>,
    version: Option<String>,
    headers: Headers,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ParserState {
    StartLine,
    Headers,
    Complete,
}

impl RequestParser {
    /// Create a new request parser
    pub fn new() -> Self {
        RequestParser {
            state: ParserState::StartLine,
            buffer: BytesMut::with_capacity(4096),
            bytes_seen: 0,
            method: None,
            uri: None,
            version: None,
            headers: Headers::new(),
        }
    }

    /// Total bytes fed so far
    pub fn bytes_seen(&self) -> usize {
        self.bytes_seen
    }

    /// Feed data to the parser
    ///
    /// Returns Ok(Some(head)) when the complete request head is parsed,
    /// Ok(None) if more data is needed, or Err on parse error.
    pub fn parse(&mut self, data: &[u8]) -> Result<Option<RequestHead>> {
        self.bytes_seen += data.len();
        self.buffer.extend_from_slice(data);

        loop {
            match self.state {
                ParserState::StartLine => {
                    if !self.parse_start_line()? {
                        return Ok(None);
                    }
                }
                ParserState::Headers => {
                    if self.parse_headers()? {
                        return Ok(Some(self.finish_head()?));
                    }
                    return Ok(None);
                }
                ParserState::Complete => return Ok(None),
            }
        }
    }

    /// Classify end-of-stream for the current parser state.
    ///
    /// EOF before any byte is a plain idle close; EOF mid-message is a
    /// malformed or truncated request.
    pub fn eof(&self) -> Error {
        match self.state {
            _ if self.bytes_seen == 0 => Error::NoMessage,
            ParserState::StartLine => {
                if self.buffer.iter().all(|b| b.is_ascii_whitespace()) {
                    Error::Parse("invalid request header".to_string())
                } else {
                    Error::Parse(format!(
                        "unterminated request line: {:?}",
                        String::from_utf8_lossy(&self.buffer)
                    ))
                }
            }
            ParserState::Headers => Error::Incomplete,
            ParserState::Complete => Error::ConnectionClosed,
        }
    }

    /// Bytes fed past the end of the header block; these are the first
    /// bytes of the request body.
    pub fn take_remaining(&mut self) -> Vec<u8> {
        self.buffer.split().to_vec()
    }

    fn parse_start_line(&mut self) -> Result<bool> {
        // Leading whitespace, including blank lines, precedes the method
        let skip = self
            .buffer
            .iter()
            .take_while(|b| b.is_ascii_whitespace())
            .count();
        self.buffer.advance(skip);

        let Some(lf_pos) = find_lf(&self.buffer) else {
            return Ok(false);
        };

        let line = String::from_utf8_lossy(&self.buffer[..lf_pos])
            .trim_end_matches('\r')
            .to_string();
        self.buffer.advance(lf_pos + 1);

        let (method, uri, version) = parse_request_line(&line)?;
        self.method = Some(method);
        self.uri = Some(uri);
        self.version = Some(version);

        self.state = ParserState::Headers;
        Ok(true)
    }

    fn parse_headers(&mut self) -> Result<bool> {
        loop {
            let Some(lf_pos) = find_lf(&self.buffer) else {
                return Ok(false);
            };

            let line = String::from_utf8_lossy(&self.buffer[..lf_pos])
                .trim_end_matches('\r')
                .to_string();
            self.buffer.advance(lf_pos + 1);

            if line.is_empty() {
                // Blank line marks the end of the header block
                return Ok(true);
            }

            let (name, value) = Headers::parse_header_line(&line)?;
            self.headers.insert(name, value);
        }
    }

    fn finish_head(&mut self) -> Result<RequestHead> {
        self.state = ParserState::Complete;

        let content_length = match self.headers.get("Content-Length") {
            Some(cl) => Some(
                cl.trim()
                    .parse::<u64>()
                    .map_err(|_| Error::Parse(format!("invalid Content-Length: {}", cl)))?,
            ),
            None => None,
        };

        let chunked = self
            .headers
            .get("Transfer-Encoding")
            .map(|te| te.split(',').any(|t| t.trim().eq_ignore_ascii_case("chunked")))
            .unwrap_or(false);

        Ok(RequestHead {
            method: self.method.take().unwrap_or(Method::Get),
            uri: self.uri.take().unwrap_or_default(),
            version: self.version.take().unwrap_or_default(),
            headers: std::mem::take(&mut self.headers),
            content_length,
            chunked,
        })
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}
