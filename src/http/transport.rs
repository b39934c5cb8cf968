//! Blocking transport abstraction
//!
//! The HTTP layer is written against [`TransportOps`] so the framing and
//! dispatch code never touches a socket type directly. The only production
//! implementation is [`TcpTransport`] over a plain `TcpStream`; tests supply
//! in-memory implementations where convenient.

use super::{Error, Result};
use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::os::fd::AsRawFd;
use std::time::Duration;

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
}

/// Transport operations trait
///
/// Defines the operations a connection worker performs on its transport.
pub trait TransportOps {
    /// Wait until the transport is ready for the requested operation.
    ///
    /// Returns true when ready, false when the timeout elapsed first.
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Read data from the transport
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Write data to the transport
    fn write(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the transport
    fn close(&mut self) -> Result<()>;

    /// Check whether the peer is still connected.
    ///
    /// Used to release long-poll waiters whose client went away. The default
    /// assumes liveness; transports that can tell should override it.
    fn is_alive(&self) -> bool {
        true
    }
}

/// Plain TCP transport
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        TcpTransport { stream }
    }

    /// Get a reference to the underlying stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl TransportOps for TcpTransport {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        use libc::{poll, pollfd, POLLIN, POLLOUT};

        let mut pfd = pollfd {
            fd: self.stream.as_raw_fd(),
            events: match events {
                PollEvents::Read => POLLIN,
                PollEvents::Write => POLLOUT,
            },
            revents: 0,
        };

        let timeout_ms = timeout.map(|d| d.as_millis() as i32).unwrap_or(-1); // -1 = infinite

        let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

        if result < 0 {
            return Err(Error::Io(io::Error::last_os_error()));
        }

        Ok(result > 0)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.stream.read(buf).map_err(Error::from)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.stream.write(buf).map_err(Error::from)
    }

    fn close(&mut self) -> Result<()> {
        use std::net::Shutdown;
        self.stream.shutdown(Shutdown::Both).map_err(Error::from)
    }

    fn is_alive(&self) -> bool {
        // A readable socket that peeks zero bytes has been closed by the
        // peer. One request per connection, so no further request bytes are
        // expected while a long poll is blocked.
        match self.poll(PollEvents::Read, Some(Duration::ZERO)) {
            Ok(false) => true,
            Ok(true) => {
                let mut probe = [0u8; 1];
                !matches!(self.stream.peek(&mut probe), Ok(0))
            }
            Err(_) => false,
        }
    }
}

/// Adapter exposing a [`TransportOps`] as `io::Read` + `io::Write`, with the
/// transport's readiness poll applied before every operation.
pub struct TransportIo<'a, T: TransportOps> {
    transport: &'a mut T,
    timeout: Option<Duration>,
}

impl<'a, T: TransportOps> TransportIo<'a, T> {
    pub fn new(transport: &'a mut T, timeout: Option<Duration>) -> Self {
        TransportIo { transport, timeout }
    }
}

fn to_io(err: Error) -> io::Error {
    match err {
        Error::Io(e) => e,
        other => io::Error::new(io::ErrorKind::Other, other.to_string()),
    }
}

impl<T: TransportOps> Read for TransportIo<'_, T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let ready = self
            .transport
            .poll(PollEvents::Read, self.timeout)
            .map_err(to_io)?;
        if !ready {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }
        self.transport.read(buf).map_err(to_io)
    }
}

impl<T: TransportOps> Write for TransportIo<'_, T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let ready = self
            .transport
            .poll(PollEvents::Write, self.timeout)
            .map_err(to_io)?;
        if !ready {
            return Err(io::Error::new(io::ErrorKind::TimedOut, "write timed out"));
        }
        self.transport.write(buf).map_err(to_io)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
