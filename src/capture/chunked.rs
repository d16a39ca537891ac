//! HTTP/1.1 chunked transfer-coding writer.
//!
//! Each `write` call becomes exactly one chunk: the payload length in
//! lowercase hex, CRLF, the payload, CRLF. [`ChunkedWriter::finish`] writes
//! the terminating zero-length chunk (`0\r\n`); the caller appends the
//! final CRLF that ends the (empty) trailer section.

use std::io::{self, Write};

/// Line terminator used by HTTP/1.1 framing.
pub const CRLF: &[u8] = b"\r\n";

/// Writer that frames every write as one HTTP chunk.
#[derive(Debug)]
pub struct ChunkedWriter<W: Write> {
    inner: W,
}

impl<W: Write> ChunkedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    /// Write the terminal zero-length chunk and return the inner writer.
    pub fn finish(mut self) -> io::Result<W> {
        self.inner.write_all(b"0\r\n")?;
        Ok(self.inner)
    }
}

impl<W: Write> Write for ChunkedWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        // A zero-length chunk would terminate the body early.
        if buf.is_empty() {
            return Ok(0);
        }
        write!(self.inner, "{:x}\r\n", buf.len())?;
        self.inner.write_all(buf)?;
        self.inner.write_all(CRLF)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
