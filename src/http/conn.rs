//! One accepted connection
//!
//! [`HttpConn`] owns the transport for a single accepted connection and
//! serves exactly one request/response cycle: receive a request (head plus
//! framed body), send one response, close. There is no keep-alive.

use super::stream::{EofReader, FixedLenReader, FixedLenWriter};
use super::transport::{PollEvents, TransportIo, TransportOps};
use super::{Error, Request, RequestHead, RequestParser, Response, Result, Status};
use std::io::Read;
use std::time::Duration;

/// A single accepted connection
pub struct HttpConn<T: TransportOps> {
    transport: T,
    timeout: Option<Duration>,
}

impl<T: TransportOps> HttpConn<T> {
    pub fn new(transport: T) -> Self {
        HttpConn {
            transport,
            timeout: Some(Duration::from_secs(10)),
        }
    }

    /// Set the I/O timeout for this connection
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Get a reference to the transport, e.g. for liveness checks
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Receive one complete request: head and body.
    ///
    /// A connection closed before any byte arrives yields
    /// [`Error::NoMessage`]; a close mid-message is a parse failure.
    pub fn receive_request(&mut self) -> Result<Request> {
        let mut parser = RequestParser::new();

        let head = loop {
            if !self.transport.poll(PollEvents::Read, self.timeout)? {
                return Err(Error::Timeout);
            }

            let mut temp = [0u8; 4096];
            let n = self.transport.read(&mut temp)?;

            if n == 0 {
                return Err(parser.eof());
            }

            if let Some(head) = parser.parse(&temp[..n])? {
                break head;
            }
        };

        let prefill = parser.take_remaining();
        let body = self.receive_body(&head, prefill)?;
        Ok(Request::new(head, body))
    }

    /// Read the request body according to the head's framing.
    fn receive_body(&mut self, head: &RequestHead, prefill: Vec<u8>) -> Result<Vec<u8>> {
        if head.chunked {
            return Err(Error::ChunkedUnsupported);
        }

        match head.content_length {
            Some(len) => {
                let len = len as usize;
                let mut body = prefill;
                if body.len() >= len {
                    // Bytes past the declared length belong to a message
                    // that will never come; drop them.
                    body.truncate(len);
                    return Ok(body);
                }

                let want = (len - body.len()) as u64;
                let io = TransportIo::new(&mut self.transport, self.timeout);
                let mut reader = FixedLenReader::new(io, want);
                let got = reader.read_to_end(&mut body)?;
                if (got as u64) < want {
                    return Err(Error::ConnectionClosed);
                }
                Ok(body)
            }
            None if head.method.body_is_bounded() => Ok(Vec::new()),
            None => {
                // No declared length: the body runs until the client closes
                let mut body = prefill;
                let io = TransportIo::new(&mut self.transport, self.timeout);
                let mut reader = EofReader::new(io);
                reader.read_to_end(&mut body)?;
                Ok(body)
            }
        }
    }

    /// Flush the response head and return the bounded body writer.
    ///
    /// The writer's budget is the response's declared `Content-Length`; the
    /// head is on the wire before the first body byte.
    pub fn send_head(
        &mut self,
        response: &Response,
    ) -> Result<FixedLenWriter<TransportIo<'_, T>>> {
        let budget = match response.headers().get("Content-Length") {
            Some(cl) => cl
                .trim()
                .parse::<u64>()
                .map_err(|_| Error::InvalidHeader(format!("Content-Length: {}", cl)))?,
            None => 0,
        };

        let wire = response.head_to_wire();
        let mut written = 0;
        while written < wire.len() {
            if !self.transport.poll(PollEvents::Write, self.timeout)? {
                return Err(Error::Timeout);
            }
            let n = self.transport.write(&wire[written..])?;
            if n == 0 {
                return Err(Error::ConnectionClosed);
            }
            written += n;
        }

        let io = TransportIo::new(&mut self.transport, self.timeout);
        Ok(FixedLenWriter::new(io, budget))
    }

    /// Send a complete response. A missing `Content-Length` header is filled
    /// in from the body; the body then flows through the bounded writer.
    pub fn send_response(&mut self, response: &Response) -> Result<()> {
        let mut response = response.clone();
        if !response.headers().contains("Content-Length") {
            let body_len = response.body().len().to_string();
            response.headers_mut().insert("Content-Length", body_len);
        }

        let body = response.body().to_vec();
        let mut writer = self.send_head(&response)?;
        writer.write_all(&body)?;
        writer.flush()
    }

    /// Send a plain-text error response
    pub fn send_error(&mut self, status: Status, message: &str) -> Result<()> {
        let response = Response::builder()
            .status(status)
            .header("Content-Type", "text/plain")
            .header("Content-Length", message.len().to_string())
            .body(message.as_bytes().to_vec())
            .build();

        self.send_response(&response)
    }

    /// Close the connection
    pub fn close(&mut self) -> Result<()> {
        self.transport.close()
    }
}
