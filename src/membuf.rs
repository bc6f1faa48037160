// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{Error, Result};

/// In-memory mirror of the currently-open blob file
///
/// A fixed-capacity, append-only byte arena. Records appended to the
/// active blob file are appended here as well, so point reads of
/// recently written keys never touch disk.
///
/// Not internally synchronized; the engine serializes all access.
pub struct MemBuffer {
    buf: Box<[u8]>,
    free: usize,
}

impl MemBuffer {
    /// Creates a buffer of exactly `capacity` bytes, all free.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            free: capacity,
        }
    }

    /// Total capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Whether `bytes` more bytes fit.
    #[must_use]
    pub fn has_room(&self, bytes: usize) -> bool {
        self.free >= bytes
    }

    /// Appends `data` at the write watermark, returning its offset.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::BufferFull`] if `data` does not fit.
    pub fn append(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() > self.free {
            return Err(Error::BufferFull);
        }

        let location = self.buf.len() - self.free;
        self.buf[location..location + data.len()].copy_from_slice(data);
        self.free -= data.len();

        Ok(location)
    }

    /// Copies up to `scratch.len()` bytes starting at `offset` into
    /// `scratch`, returning how many were copied.
    ///
    /// Reads crossing the end of the buffer are truncated to capacity
    /// (a short read, not an error).
    ///
    /// # Errors
    ///
    /// Fails if `offset` lies at or beyond capacity.
    pub fn read(&self, offset: usize, scratch: &mut [u8]) -> Result<usize> {
        if offset >= self.buf.len() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "read past memory buffer capacity",
            )));
        }

        let n = scratch.len().min(self.buf.len() - offset);
        scratch[..n].copy_from_slice(&self.buf[offset..offset + n]);

        Ok(n)
    }

    /// Resets the write watermark; contents become logically undefined.
    ///
    /// Called when a fresh blob file becomes the mirror target.
    pub fn truncate(&mut self) {
        self.free = self.buf.len();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn membuf_append_locations() -> crate::Result<()> {
        let mut buf = MemBuffer::with_capacity(16);

        assert!(buf.has_room(16));
        assert_eq!(buf.append(b"abcd")?, 0);
        assert_eq!(buf.append(b"efgh")?, 4);
        assert!(buf.has_room(8));
        assert!(!buf.has_room(9));

        Ok(())
    }

    #[test]
    fn membuf_append_full() -> crate::Result<()> {
        let mut buf = MemBuffer::with_capacity(4);

        assert_eq!(buf.append(b"ab")?, 0);
        assert!(matches!(buf.append(b"cde"), Err(Error::BufferFull)));

        // the failed append must not move the watermark
        assert_eq!(buf.append(b"cd")?, 2);

        Ok(())
    }

    #[test]
    fn membuf_read_back() -> crate::Result<()> {
        let mut buf = MemBuffer::with_capacity(16);
        buf.append(b"hello world")?;

        let mut scratch = [0u8; 5];
        assert_eq!(buf.read(6, &mut scratch)?, 5);
        assert_eq!(&scratch, b"world");

        Ok(())
    }

    #[test]
    fn membuf_short_read_at_capacity() -> crate::Result<()> {
        let mut buf = MemBuffer::with_capacity(8);
        buf.append(b"abcdefgh")?;

        let mut scratch = [0u8; 8];
        assert_eq!(buf.read(6, &mut scratch)?, 2);
        assert_eq!(&scratch[..2], b"gh");

        Ok(())
    }

    #[test]
    fn membuf_read_past_capacity() {
        let buf = MemBuffer::with_capacity(8);
        let mut scratch = [0u8; 1];

        assert!(matches!(buf.read(8, &mut scratch), Err(Error::Io(_))));
        assert!(matches!(buf.read(100, &mut scratch), Err(Error::Io(_))));
    }

    #[test]
    fn membuf_truncate_resets_watermark() -> crate::Result<()> {
        let mut buf = MemBuffer::with_capacity(8);
        buf.append(b"abcdefgh")?;
        assert!(!buf.has_room(1));

        buf.truncate();
        assert!(buf.has_room(8));
        assert_eq!(buf.append(b"xy")?, 0);

        Ok(())
    }
}
