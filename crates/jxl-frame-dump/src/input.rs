use std::io::prelude::*;
use std::num::NonZeroUsize;

/// Fixed-size input window fed to the decoder.
///
/// Bytes the decoder did not consume stay at the front of the window after
/// [`release`][Self::release], and are supplied again together with the next chunk.
#[derive(Debug)]
pub struct InputChunk {
    buf: Vec<u8>,
    chunk_size: usize,
    start: usize,
    end: usize,
    total_read: u64,
}

impl InputChunk {
    pub const DEFAULT_SIZE: NonZeroUsize = NonZeroUsize::new(1024).unwrap();

    pub fn new(chunk_size: NonZeroUsize) -> Self {
        let chunk_size = chunk_size.get();
        Self {
            buf: vec![0u8; chunk_size],
            chunk_size,
            start: 0,
            end: 0,
            total_read: 0,
        }
    }

    /// Returns the bytes supplied but not consumed yet.
    #[inline]
    pub fn pending(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Marks `count` pending bytes as consumed.
    #[inline]
    pub fn consume(&mut self, count: usize) {
        debug_assert!(count <= self.end - self.start);
        self.start = (self.start + count).min(self.end);
    }

    /// Moves unconsumed bytes to the front, making room for the next chunk.
    pub fn release(&mut self) {
        if self.start == 0 {
            return;
        }
        self.buf.copy_within(self.start..self.end, 0);
        self.end -= self.start;
        self.start = 0;
    }

    /// Reads the next chunk, returning the number of bytes read.
    ///
    /// Fills the whole chunk unless the reader reaches end of stream, so a short read means no
    /// more data. Returns `Ok(0)` at end of stream.
    pub fn fill(&mut self, mut reader: impl Read) -> std::io::Result<usize> {
        let required = self.end + self.chunk_size;
        if self.buf.len() < required {
            self.buf.resize(required, 0);
        }

        let chunk = &mut self.buf[self.end..required];
        let mut bytes_read = 0;
        while bytes_read < chunk.len() {
            match reader.read(&mut chunk[bytes_read..]) {
                Ok(0) => break,
                Ok(count) => bytes_read += count,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }

        self.end += bytes_read;
        self.total_read += bytes_read as u64;
        Ok(bytes_read)
    }

    /// Returns the total number of bytes read from the input.
    #[inline]
    pub fn total_read(&self) -> u64 {
        self.total_read
    }
}
