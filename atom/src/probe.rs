//! Emptiness probes for request bodies.
//!
//! A buffered reader is peeked with `fill_buf` and nothing is consumed.
//! A plain reader is wrapped in [`Pushback`]: one byte is read and, if
//! there was one, pushed back so the full body is still readable.

use std::io::{self, BufRead, ErrorKind, Read};

/// A reader with room to un-read one byte.
#[derive(Debug)]
pub struct Pushback<R> {
    inner: R,
    pending: Option<u8>,
}

impl<R: Read> Pushback<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pending: None }
    }

    /// Make `byte` the next byte returned. Only one byte fits.
    pub fn unread(&mut self, byte: u8) -> io::Result<()> {
        if self.pending.is_some() {
            return Err(io::Error::other("push-back buffer is full"));
        }
        self.pending = Some(byte);
        Ok(())
    }

    /// `true` when the stream is at end. Consumes nothing observable.
    pub fn is_empty(&mut self) -> io::Result<bool> {
        if self.pending.is_some() {
            return Ok(false);
        }
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(true),
                Ok(_) => {
                    self.unread(byte[0])?;
                    return Ok(false);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for Pushback<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.pending.take() {
            Some(byte) => {
                buf[0] = byte;
                let more = match self.inner.read(&mut buf[1..]) {
                    Ok(n) => n,
                    Err(e) if e.kind() == ErrorKind::Interrupted => 0,
                    Err(e) => return Err(e),
                };
                Ok(1 + more)
            }
            None => self.inner.read(buf),
        }
    }
}

/// Peek a buffered reader without consuming anything.
pub fn is_empty_buffered<R: BufRead>(reader: &mut R) -> io::Result<bool> {
    loop {
        match reader.fill_buf() {
            Ok(buf) => return Ok(buf.is_empty()),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
}
