// Copyright 2016-2020 mime-multipart Developers
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The pull-style byte source contract and the carry-over buffer that sits
//! in front of it.

use std::io::Read;

use crate::error::Error;

/// A pull reader: `read(n)` returns up to `n` bytes, or an empty `Vec` to
/// signal EOF. This is the decoder's only collaborator for byte input —
/// sockets, HTTP framing, and buffering beyond the carry-over buffer below
/// are the host's concern.
pub trait Source {
    fn read(&mut self, n: usize) -> std::io::Result<Vec<u8>>;
}

/// Any `std::io::Read` is a valid `Source`: a single read of up to `n`
/// bytes, truncated to however much was actually read. A `&[u8]` (or
/// `Cursor<Vec<u8>>`) used this way naturally becomes a one-shot source —
/// once exhausted, further reads return `Ok(vec![])`, matching the
/// one-shot in-memory-chunk case a decoder driven directly off a
/// byte slice needs to handle.
impl<R: Read + ?Sized> Source for R {
    fn read(&mut self, n: usize) -> std::io::Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        let read = Read::read(self, &mut buf)?;
        buf.truncate(read);
        Ok(buf)
    }
}

/// A carry-over buffer holding bytes pulled from a `Source` but not yet
/// consumed by the scanner. `chunksize` bounds how many bytes are
/// requested per `read_chunk` call.
pub struct ChunkedBuffer {
    buf: Vec<u8>,
    start: usize,
    chunksize: usize,
    exhausted: bool,
}

impl ChunkedBuffer {
    pub fn new(chunksize: usize) -> Result<ChunkedBuffer, Error> {
        if chunksize == 0 {
            return Err(Error::InvalidChunksize);
        }
        Ok(ChunkedBuffer {
            buf: Vec::new(),
            start: 0,
            chunksize,
            exhausted: false,
        })
    }

    /// The currently unconsumed bytes, as one contiguous slice.
    pub fn unconsumed(&self) -> &[u8] {
        &self.buf[self.start..]
    }

    pub fn len(&self) -> usize {
        self.buf.len() - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the first `n` unconsumed bytes. Periodically compacts the
    /// backing `Vec` so a long-running scan doesn't retain an
    /// ever-growing prefix of already-consumed bytes.
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.len(), "consume past end of buffer");
        self.start += n;
        if self.start > 64 * 1024 && self.start * 2 > self.buf.len() {
            self.buf.drain(..self.start);
            self.start = 0;
        }
    }

    /// Pulls up to `chunksize` bytes from `source` and appends them.
    /// Fails with `InsufficientData` once the source has signalled EOF.
    pub fn read_chunk<S: Source + ?Sized>(&mut self, source: &mut S) -> Result<(), Error> {
        if self.exhausted {
            return Err(Error::InsufficientData);
        }
        let chunk = source.read(self.chunksize).map_err(Error::ReaderFailure)?;
        if chunk.is_empty() {
            self.exhausted = true;
            return Err(Error::InsufficientData);
        }
        self.buf.extend_from_slice(&chunk);
        Ok(())
    }

    /// Attempts one more refill without treating EOF as fatal; used by
    /// the epilogue drain, which wants to read until EOF rather than
    /// erroring on it.
    pub fn try_read_chunk<S: Source + ?Sized>(&mut self, source: &mut S) -> Result<bool, Error> {
        if self.exhausted {
            return Ok(false);
        }
        let chunk = source.read(self.chunksize).map_err(Error::ReaderFailure)?;
        if chunk.is_empty() {
            self.exhausted = true;
            return Ok(false);
        }
        self.buf.extend_from_slice(&chunk);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_chunk_accumulates() {
        let mut src = Cursor::new(b"hello world".to_vec());
        let mut buf = ChunkedBuffer::new(4).unwrap();
        buf.read_chunk(&mut src).unwrap();
        assert_eq!(buf.unconsumed(), b"hell");
        buf.read_chunk(&mut src).unwrap();
        assert_eq!(buf.unconsumed(), b"hello wo");
    }

    #[test]
    fn consume_advances_view() {
        let mut src = Cursor::new(b"hello world".to_vec());
        let mut buf = ChunkedBuffer::new(64).unwrap();
        buf.read_chunk(&mut src).unwrap();
        buf.consume(6);
        assert_eq!(buf.unconsumed(), b"world");
    }

    #[test]
    fn eof_is_insufficient_data() {
        let mut src = Cursor::new(Vec::<u8>::new());
        let mut buf = ChunkedBuffer::new(16).unwrap();
        let err = buf.read_chunk(&mut src).unwrap_err();
        assert!(matches!(err, Error::InsufficientData));
    }

    #[test]
    fn zero_chunksize_rejected() {
        assert!(matches!(ChunkedBuffer::new(0), Err(Error::InvalidChunksize)));
    }

    #[test]
    fn one_shot_slice_is_exhausted_after_one_read() {
        let data: &[u8] = b"abc";
        let mut cur = data;
        let mut buf = ChunkedBuffer::new(16).unwrap();
        buf.read_chunk(&mut cur).unwrap();
        assert_eq!(buf.unconsumed(), b"abc");
        assert!(matches!(buf.read_chunk(&mut cur), Err(Error::InsufficientData)));
    }
}
