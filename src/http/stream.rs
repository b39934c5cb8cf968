//! Body stream framing
//!
//! Presents a message body of known or unknown length as a bounded byte
//! stream over a shared underlying connection, in both directions:
//!
//! - [`FixedLenReader`] yields exactly N bytes then end-of-stream, even when
//!   the underlying stream has more data.
//! - [`EofReader`] reads until the underlying connection closes; used for
//!   request bodies that announce no length.
//! - [`FixedLenWriter`] enforces a declared output length and fails any
//!   write that would exceed it.
//!
//! Chunked transfer encoding is not implemented; callers reject it before a
//! body reader is ever constructed.

use super::{Error, Result};
use std::io::{self, Read, Write};

/// Reads exactly `len` bytes from the underlying stream, then reports
/// end-of-stream. Bytes past the bound stay in the underlying stream.
pub struct FixedLenReader<R: Read> {
    inner: R,
    remaining: u64,
}

impl<R: Read> FixedLenReader<R> {
    pub fn new(inner: R, len: u64) -> Self {
        FixedLenReader {
            inner,
            remaining: len,
        }
    }

    /// Bytes still to be read before end-of-stream
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Consume the reader and return the underlying stream
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for FixedLenReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }

        let want = buf.len().min(self.remaining as usize);
        let n = self.inner.read(&mut buf[..want])?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Reads until the underlying connection signals end-of-file. A transparent
/// wrapper kept for symmetry with the bounded reader.
pub struct EofReader<R: Read> {
    inner: R,
}

impl<R: Read> EofReader<R> {
    pub fn new(inner: R) -> Self {
        EofReader { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for EofReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Writes at most `budget` bytes to the underlying stream.
///
/// A write that would exceed the budget writes the permitted remainder and
/// then fails with [`Error::BodyOverflow`]; any later positive-length write
/// fails immediately. Zero-length writes are always accepted.
pub struct FixedLenWriter<W: Write> {
    inner: W,
    budget: u64,
    remaining: u64,
}

impl<W: Write> FixedLenWriter<W> {
    pub fn new(inner: W, budget: u64) -> Self {
        FixedLenWriter {
            inner,
            budget,
            remaining: budget,
        }
    }

    /// Bytes that may still be written
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Write the whole buffer, or as much of it as the budget permits
    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }
        if self.remaining == 0 {
            return Err(Error::BodyOverflow(self.budget));
        }

        let permitted = buf.len().min(self.remaining as usize);
        self.inner.write_all(&buf[..permitted])?;
        self.remaining -= permitted as u64;

        if permitted < buf.len() {
            return Err(Error::BodyOverflow(self.budget));
        }
        Ok(())
    }

    /// Flush the underlying stream
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    /// Consume the writer and return the underlying stream
    pub fn into_inner(self) -> W {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_fixed_len_reader_stops_at_bound() {
        let upstream = Cursor::new(b"0123456789extra".to_vec());
        let mut reader = FixedLenReader::new(upstream, 10);

        let mut body = Vec::new();
        reader.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"0123456789");

        // Subsequent reads report end-of-stream even with upstream data left
        let mut buf = [0u8; 4];
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_fixed_len_reader_leaves_upstream_bytes() {
        let upstream = Cursor::new(b"abcdef".to_vec());
        let mut reader = FixedLenReader::new(upstream, 3);

        let mut body = Vec::new();
        reader.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"abc");

        let mut rest = Vec::new();
        reader.into_inner().read_to_end(&mut rest).unwrap();
        assert_eq!(rest, b"def");
    }

    #[test]
    fn test_eof_reader() {
        let mut reader = EofReader::new(Cursor::new(b"whole stream".to_vec()));
        let mut body = Vec::new();
        reader.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"whole stream");
    }

    #[test]
    fn test_fixed_len_writer_exact_budget() {
        let mut writer = FixedLenWriter::new(Vec::new(), 5);
        writer.write_all(b"hello").unwrap();
        assert_eq!(writer.remaining(), 0);
        assert_eq!(writer.into_inner(), b"hello");
    }

    #[test]
    fn test_fixed_len_writer_overflow_writes_remainder() {
        let mut writer = FixedLenWriter::new(Vec::new(), 5);
        let err = writer.write_all(b"hello!").unwrap_err();
        assert!(matches!(err, Error::BodyOverflow(5)));
        // The permitted remainder made it through before the failure
        assert_eq!(writer.into_inner(), b"hello");
    }

    #[test]
    fn test_fixed_len_writer_exhausted() {
        let mut writer = FixedLenWriter::new(Vec::new(), 3);
        writer.write_all(b"abc").unwrap();

        let err = writer.write_all(b"x").unwrap_err();
        assert!(matches!(err, Error::BodyOverflow(3)));

        // Zero-length writes on an exhausted budget are accepted silently
        writer.write_all(b"").unwrap();
    }
}
