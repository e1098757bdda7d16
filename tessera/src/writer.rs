//! A span-vending buffered writer over an append-only byte sink.
//!
//! Callers ask for a writable region of at least `min_size` bytes, write
//! into it directly, then `advance` the bytes they actually used. This lets
//! fixed-width numeric array encoders write runs of elements without a
//! bounds check per element.

use std::io::Write as IoWrite;

use crate::error::Result;

/// Buffers flush to the underlying sink once this many bytes have
/// accumulated.
pub const FLUSH_LIMIT: usize = 256 * 1024;

/// A type that knows its current position in the stream.
pub trait Positional {
    /// The number of bytes written so far.
    fn pos(&self) -> usize;
}

/// Vends writable spans over an underlying [`std::io::Write`] sink,
/// auto-flushing once the internal buffer would exceed [`FLUSH_LIMIT`].
pub struct BufferedWriter<W> {
    sink: W,
    buf: Vec<u8>,
    /// Length of the buffer that has actually been committed via `advance`.
    committed: usize,
    /// Length of the span most recently vended by `get_span`.
    vended: usize,
    pos: usize,
}

impl<W: IoWrite> BufferedWriter<W> {
    /// Wraps `sink` in a fresh buffered writer.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            buf: Vec::new(),
            committed: 0,
            vended: 0,
            pos: 0,
        }
    }

    /// Returns a writable, contiguous region of at least `min_size` bytes.
    ///
    /// Grows the internal buffer as needed. If growing past `min_size` would
    /// exceed [`FLUSH_LIMIT`], the buffer is flushed to the sink first so the
    /// vended span never causes unbounded memory growth.
    pub fn get_span(&mut self, min_size: usize) -> Result<&mut [u8]> {
        if self.committed + min_size > FLUSH_LIMIT && self.committed > 0 {
            self.flush()?;
        }
        let needed = self.committed + min_size;
        if self.buf.len() < needed {
            self.buf.resize(needed, 0);
        }
        self.vended = min_size;
        Ok(&mut self.buf[self.committed..self.committed + min_size])
    }

    /// Marks the first `n` bytes of the most recently vended span as
    /// committed, i.e. ready to be flushed to the sink.
    ///
    /// # Panics
    ///
    /// Panics if `n` exceeds the size of the span just vended by
    /// `get_span`. This is a caller bug, not a malformed stream, so it is
    /// not surfaced as an `Error`.
    pub fn advance(&mut self, n: usize) {
        assert!(
            n <= self.vended,
            "advance({n}) exceeds the {}-byte span just vended",
            self.vended
        );
        self.committed += n;
        self.pos += n;
        self.vended = 0;
        if self.committed >= FLUSH_LIMIT {
            // Best effort: a hard flush failure surfaces on the next
            // explicit `flush()` or `write_bytes()` call instead, so a
            // transient sink error here doesn't get silently swallowed on a
            // path that returns no `Result`. We eagerly try anyway because
            // it keeps memory bounded in the common case.
            let _ = self.try_flush();
        }
    }

    /// Writes `bytes` as a single committed span. Convenience wrapper around
    /// `get_span` + copy + `advance` for callers that already have a
    /// contiguous slice (the common case for tag bytes and LEB128 groups).
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let span = self.get_span(bytes.len())?;
        span.copy_from_slice(bytes);
        self.advance(bytes.len());
        Ok(())
    }

    fn try_flush(&mut self) -> Result<()> {
        if self.committed > 0 {
            self.sink.write_all(&self.buf[..self.committed])?;
            self.buf.drain(..self.committed);
            self.committed = 0;
        }
        Ok(())
    }

    /// Flushes any committed bytes to the underlying sink.
    pub fn flush(&mut self) -> Result<()> {
        self.try_flush()?;
        self.sink.flush()?;
        Ok(())
    }

    /// Consumes the writer, flushing first, and returns the underlying sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.sink)
    }
}

impl<W> Positional for BufferedWriter<W> {
    fn pos(&self) -> usize {
        self.pos
    }
}

/// An object-safe view of "something bytes can be written to".
///
/// The primitive and array codecs are written against this trait rather
/// than the concrete [`BufferedWriter`] so that the custom-type dispatcher
/// can store encode closures in a process-wide registry without being
/// generic over every possible underlying sink type.
pub trait Sink {
    /// Writes `bytes` to the sink.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<W: IoWrite> Sink for BufferedWriter<W> {
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        BufferedWriter::write_bytes(self, bytes)
    }
}

impl<W: IoWrite> Drop for BufferedWriter<W> {
    fn drop(&mut self) {
        let _ = self.try_flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn small_writes_accumulate_before_flush() {
        let mut w = BufferedWriter::new(Vec::new());
        w.write_bytes(&[1, 2, 3]).unwrap();
        w.write_bytes(&[4, 5]).unwrap();
        let out = w.into_inner().unwrap();
        assert_eq!(out, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn span_then_advance() {
        let mut w = BufferedWriter::new(Vec::new());
        {
            let span = w.get_span(4).unwrap();
            span.copy_from_slice(&[9, 9, 9, 9]);
        }
        w.advance(2);
        w.write_bytes(&[1]).unwrap();
        let out = w.into_inner().unwrap();
        assert_eq!(out, vec![9, 9, 1]);
    }

    #[test]
    #[should_panic]
    fn advance_past_span_panics() {
        let mut w = BufferedWriter::new(Vec::new());
        let _ = w.get_span(2).unwrap();
        w.advance(3);
    }

    #[test]
    fn flushes_past_limit() {
        let mut w = BufferedWriter::new(Vec::new());
        let chunk = vec![7u8; FLUSH_LIMIT / 4];
        for _ in 0..6 {
            w.write_bytes(&chunk).unwrap();
        }
        let out = w.into_inner().unwrap();
        assert_eq!(out.len(), chunk.len() * 6);
        assert!(out.iter().all(|&b| b == 7));
    }

    #[test]
    fn pos_tracks_committed_bytes() {
        let mut w = BufferedWriter::new(Vec::new());
        assert_eq!(w.pos(), 0);
        w.write_bytes(&[1, 2, 3]).unwrap();
        assert_eq!(w.pos(), 3);
    }
}
