//! A small buffered byte source used by the decode side.
//!
//! The writer side needs the span-vending contract of [`crate::writer`]
//! because array encoders stream many elements into one region. The reader
//! side only ever needs "give me the next N bytes", so a thin wrapper over
//! [`std::io::Read`] (with its own small read-ahead buffer to avoid a
//! syscall per byte) is enough.

use std::io::Read as IoRead;

use crate::error::{Error, Result};

const READ_AHEAD: usize = 8 * 1024;

/// Reads bytes from an underlying [`std::io::Read`] source, buffering small
/// reads so LEB128 decoding doesn't take a syscall per byte.
pub struct ByteReader<R> {
    source: R,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
    total_read: usize,
}

impl<R: IoRead> ByteReader<R> {
    /// Wraps `source` in a fresh buffered reader.
    pub fn new(source: R) -> Self {
        Self {
            source,
            buf: vec![0u8; READ_AHEAD],
            pos: 0,
            filled: 0,
            total_read: 0,
        }
    }

    fn fill(&mut self) -> Result<()> {
        if self.pos == self.filled {
            self.pos = 0;
            self.filled = self.source.read(&mut self.buf)?;
        }
        Ok(())
    }

    /// Reads and returns a single byte, failing with `CorruptStream` if the
    /// source is exhausted.
    pub fn read_u8(&mut self) -> Result<u8> {
        self.fill()?;
        if self.pos == self.filled {
            return Err(Error::corrupt("unexpected end of stream"));
        }
        let b = self.buf[self.pos];
        self.pos += 1;
        self.total_read += 1;
        Ok(b)
    }

    /// Returns the next byte without consuming it. Used by [`Option`]'s
    /// `Decode` impl to distinguish a `NullReference` tag from a real value
    /// before committing to a read.
    pub fn peek_u8(&mut self) -> Result<u8> {
        self.fill()?;
        if self.pos == self.filled {
            return Err(Error::corrupt("unexpected end of stream"));
        }
        Ok(self.buf[self.pos])
    }

    /// Reads exactly `N` bytes into a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        for slot in out.iter_mut() {
            *slot = self.read_u8()?;
        }
        Ok(out)
    }

    /// Reads exactly `len` bytes into a freshly allocated `Vec<u8>`.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        for slot in out.iter_mut() {
            *slot = self.read_u8()?;
        }
        Ok(out)
    }

    /// Total bytes consumed from the source so far.
    pub fn pos(&self) -> usize {
        self.total_read
    }
}

/// An object-safe view of "something bytes can be read from".
///
/// Mirrors [`crate::writer::Sink`] on the decode side: primitive and array
/// decoders are written against this trait so the custom-type dispatcher's
/// registry can hold decode closures that work for any concrete byte
/// source.
pub trait Source {
    /// Reads and returns a single byte, failing on end-of-stream.
    fn read_u8(&mut self) -> Result<u8>;

    /// Returns the next byte without consuming it.
    fn peek_u8(&mut self) -> Result<u8>;
}

impl<R: IoRead> Source for ByteReader<R> {
    fn read_u8(&mut self) -> Result<u8> {
        ByteReader::read_u8(self)
    }

    fn peek_u8(&mut self) -> Result<u8> {
        ByteReader::peek_u8(self)
    }
}

/// Reads exactly `N` bytes into a fixed-size array from any [`Source`].
///
/// A free function rather than a trait method: a generic (const-parameter)
/// method would make [`Source`] unusable as a trait object, which defeats
/// the point of the abstraction.
pub fn read_array<const N: usize>(r: &mut dyn Source) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    for slot in out.iter_mut() {
        *slot = r.read_u8()?;
    }
    Ok(out)
}

/// Reads exactly `len` bytes into a freshly allocated `Vec<u8>` from any
/// [`Source`].
pub fn read_vec(r: &mut dyn Source, len: usize) -> Result<Vec<u8>> {
    let mut out = vec![0u8; len];
    for slot in out.iter_mut() {
        *slot = r.read_u8()?;
    }
    Ok(out)
}
