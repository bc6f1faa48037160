// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::{encode_record_header, fixed64, MAX_RECORD_SIZE, RECORD_HEADER_SIZE},
    env::{Env, WritableFile},
    file::blob_file_path,
    membuf::MemBuffer,
    Error, Result,
};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU64, Ordering::Release},
        Arc,
    },
};

/// Where a record landed: which blob file, at which offset, how big.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RecordLocation {
    /// Log number of the blob file holding the record.
    pub log_number: u64,

    /// Byte offset of the record header inside the file.
    pub offset: u64,

    /// Exact on-disk size of the record (header + key + value).
    pub total_size: usize,
}

/// Owns the active blob log and its in-memory mirror
///
/// Appends records to both, rotates to a fresh file when the mirror
/// runs out of room, and hands out the in-file location of every
/// record. Not internally synchronized; the engine wraps it in its
/// mutex.
pub struct BlobWriter {
    env: Arc<dyn Env>,
    prefix: PathBuf,

    file: Box<dyn WritableFile>,
    membuf: MemBuffer,

    /// Mirror of the active log number, shared with the engine so the
    /// read path can probe it without taking the engine lock.
    current_log: Arc<AtomicU64>,

    next_log_number: u64,
}

impl BlobWriter {
    /// Opens the first blob log, numbered `first_log_number`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be created.
    pub fn create(
        env: Arc<dyn Env>,
        prefix: PathBuf,
        first_log_number: u64,
        write_buffer_size: usize,
        current_log: Arc<AtomicU64>,
    ) -> Result<Self> {
        let path = blob_file_path(&prefix, first_log_number);
        let file = env.new_writable_file(&path)?;
        current_log.store(first_log_number, Release);

        log::debug!("opened blob log {}", path.display());

        Ok(Self {
            env,
            prefix,
            file,
            membuf: MemBuffer::with_capacity(write_buffer_size),
            current_log,
            next_log_number: first_log_number + 1,
        })
    }

    fn new_log_number(&mut self) -> u64 {
        let n = self.next_log_number;
        self.next_log_number += 1;
        n
    }

    /// Log number of the blob file currently being written.
    #[must_use]
    pub fn current_log_number(&self) -> u64 {
        self.current_log.load(std::sync::atomic::Ordering::Acquire)
    }

    /// The mirror of the active blob file.
    #[must_use]
    pub fn membuf(&self) -> &MemBuffer {
        &self.membuf
    }

    /// Closes the active log and starts a fresh one.
    ///
    /// The outgoing file is flushed best-effort; the mirror is reset.
    /// Log numbers are never reused, even if opening the new file
    /// fails.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the new file cannot be created; the old
    /// file stays current in that case.
    pub fn rotate(&mut self) -> Result<()> {
        let log_number = self.new_log_number();
        let path = blob_file_path(&self.prefix, log_number);
        let file = self.env.new_writable_file(&path)?;

        let mut old = std::mem::replace(&mut self.file, file);
        if let Err(e) = old.flush() {
            log::error!("failed to flush outgoing blob log: {e}");
        }

        self.current_log.store(log_number, Release);
        self.membuf.truncate();

        log::debug!("rotated blob log to #{log_number}");

        Ok(())
    }

    /// Appends one `[header][key][value]` record to the mirror and the
    /// active file, rotating first if the mirror lacks room.
    ///
    /// With `sync`, the file is flushed afterwards (payload
    /// durability).
    ///
    /// # Errors
    ///
    /// Oversized keys/values/records fail with `InvalidArgument`
    /// before anything is written; records larger than the whole
    /// mirror fail with `BufferFull`.
    pub fn append_record(&mut self, key: &[u8], value: &[u8], sync: bool) -> Result<RecordLocation> {
        let header = encode_record_header(key.len(), value.len())?;

        let total_size = RECORD_HEADER_SIZE + key.len() + value.len();
        if total_size > MAX_RECORD_SIZE {
            return Err(Error::InvalidArgument(
                "record exceeds the locator's 1023 KiB size field",
            ));
        }

        if !self.membuf.has_room(total_size) {
            self.rotate()?;
        }

        let header = fixed64(header);
        let location = self.membuf.append(&header)?;
        self.file.append(&header).map_err(Error::Io)?;

        self.membuf.append(key)?;
        self.membuf.append(value)?;
        self.file.append(key).map_err(Error::Io)?;
        self.file.append(value).map_err(Error::Io)?;

        if sync {
            self.file.flush().map_err(Error::Io)?;
        }

        Ok(RecordLocation {
            log_number: self.current_log_number(),
            offset: location as u64,
            total_size,
        })
    }

    /// Flushes the active log.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    pub fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(Error::Io)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::env::StdEnv;
    use crate::file::BLOB_FILE_SUFFIX;
    use test_log::test;

    fn writer(prefix: &std::path::Path, buffer: usize) -> crate::Result<(BlobWriter, Arc<AtomicU64>)> {
        let current_log = Arc::new(AtomicU64::new(0));
        let writer = BlobWriter::create(
            Arc::new(StdEnv),
            prefix.into(),
            0,
            buffer,
            current_log.clone(),
        )?;
        Ok((writer, current_log))
    }

    fn dat_files(prefix: &std::path::Path) -> usize {
        std::fs::read_dir(prefix)
            .unwrap()
            .filter_map(|dirent| {
                let name = dirent.unwrap().file_name();
                name.to_str()?.ends_with(BLOB_FILE_SUFFIX).then_some(())
            })
            .count()
    }

    #[test]
    fn blob_writer_record_offsets() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut writer, _) = writer(dir.path(), 1024)?;

        let a = writer.append_record(b"a", b"1", false)?;
        assert_eq!(a.log_number, 0);
        assert_eq!(a.offset, 0);
        assert_eq!(a.total_size, 10);

        let b = writer.append_record(b"bb", b"22", false)?;
        assert_eq!(b.log_number, 0);
        assert_eq!(b.offset, 10);
        assert_eq!(b.total_size, 12);

        Ok(())
    }

    #[test]
    fn blob_writer_rotates_on_overflow() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut writer, current_log) = writer(dir.path(), 32)?;

        // 3 * 10 bytes do not fit into 32
        for _ in 0..2 {
            writer.append_record(b"k", b"v", false)?;
        }
        let loc = writer.append_record(b"k", b"v", false)?;

        assert_eq!(loc.log_number, 1);
        assert_eq!(loc.offset, 0, "mirror must restart in the fresh log");
        assert_eq!(current_log.load(std::sync::atomic::Ordering::Acquire), 1);
        assert_eq!(dat_files(dir.path()), 2);

        Ok(())
    }

    #[test]
    fn blob_writer_sync_writes_through() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut writer, _) = writer(dir.path(), 1024)?;

        writer.append_record(b"key", b"value", true)?;

        let on_disk = std::fs::read(blob_file_path(dir.path(), 0))?;
        assert_eq!(on_disk.len(), 16);
        assert_eq!(&on_disk[8..11], b"key");
        assert_eq!(&on_disk[11..], b"value");

        Ok(())
    }

    #[test]
    fn blob_writer_rejects_record_larger_than_mirror() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut writer, _) = writer(dir.path(), 16)?;

        assert!(matches!(
            writer.append_record(b"key", b"a long enough value", false),
            Err(Error::BufferFull),
        ));

        Ok(())
    }

    #[test]
    fn blob_writer_rejects_oversized_value() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let (mut writer, _) = writer(dir.path(), 1024)?;

        let value = vec![0u8; crate::coding::MAX_VALUE_SIZE + 1];
        assert!(matches!(
            writer.append_record(b"k", &value, false),
            Err(Error::InvalidArgument(_)),
        ));

        Ok(())
    }
}
