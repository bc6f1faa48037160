// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    blob_writer::BlobWriter,
    coding::{decode_locator_bytes, decode_record_header, encode_locator, fixed64, read_fixed64,
        Locator, COLUMN_MAGIC, RECORD_HEADER_SIZE},
    config::{Config, ReadOptions, WriteOptions, MAX_SERVER_ID},
    db_iter::ColumnIterator,
    env::Env,
    file::{parse_blob_file_name, BLOB_FILE_SUFFIX},
    handle_cache::HandleCache,
    index::{BatchOp, DbIterator, IndexDb, SeqNo, Snapshot, WriteBatch},
    Error, Result, Slice, UserValue,
};
use std::{
    ops::Range,
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering::Acquire},
        Arc, Mutex,
    },
};

/// Log numbers are partitioned per server by seeding the counter with
/// `server_id << 14`.
const SERVER_ID_SHIFT: u32 = 14;

/// A column store: an ordered index of locators over rotated,
/// append-only blob logs
///
/// Values are packed back-to-back into the active blob file (and its
/// in-memory mirror); the index only ever stores the fixed 8-byte
/// locator of each record. Point reads of keys in the active log are
/// served from the mirror without touching disk; older logs are read
/// through a bounded cache of open file handles.
///
/// All operations are usable from multiple threads.
pub struct ColumnDb {
    index: Arc<dyn IndexDb>,

    /// Guards the mirror, the active file and rotation.
    blob: Mutex<BlobWriter>,

    /// Lock-free mirror of the active log number; the read fast path
    /// probes this before taking the blob lock.
    current_log: Arc<AtomicU64>,

    handle_cache: HandleCache,
}

impl ColumnDb {
    /// Opens the engine: recovers the log counter from the blob
    /// directory, opens the first fresh blob log, and wires up the
    /// handle cache.
    pub(crate) fn open(config: Config, index: Arc<dyn IndexDb>) -> Result<Self> {
        if config.server_id > MAX_SERVER_ID {
            return Err(Error::InvalidArgument("server id exceeds 255"));
        }

        let path = std::path::absolute(&config.path).unwrap_or_else(|_| config.path.clone());
        let blob_dir = path.parent().map_or_else(|| path.clone(), Path::to_path_buf);

        let first_log_number =
            recover_log_number(config.env.as_ref(), &blob_dir, config.server_id);

        let current_log = Arc::new(AtomicU64::new(0));
        let blob = BlobWriter::create(
            config.env.clone(),
            blob_dir.clone(),
            first_log_number,
            config.write_buffer_size,
            current_log.clone(),
        )?;

        let handle_cache = HandleCache::new(config.env, blob_dir, config.max_open_files);

        Ok(Self {
            index,
            blob: Mutex::new(blob),
            current_log,
            handle_cache,
        })
    }

    /// Inserts a key-value pair: the payload goes into the active blob
    /// log, its locator into the index.
    ///
    /// A concurrent `get` of the same key may still report not-found
    /// until this returns; the locator is published after the payload.
    ///
    /// # Errors
    ///
    /// Oversized keys/values fail with `InvalidArgument`. If the index
    /// insert fails after the payload was appended, the error surfaces
    /// and the appended bytes become unreferenced garbage.
    pub fn put(&self, opts: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        let location = {
            let mut blob = self.blob.lock().expect("lock is poisoned");
            blob.append_record(key, value, opts.sync)?
        };

        let locator = encode_locator(location.log_number, location.offset, location.total_size)?;
        self.index.put(opts, key, &fixed64(locator))
    }

    /// Removes a key from the index.
    ///
    /// The payload stays in its blob file; blob space is never
    /// reclaimed.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the index cannot apply the delete.
    pub fn delete(&self, opts: &WriteOptions, key: &[u8]) -> Result<()> {
        self.index.delete(opts, key)
    }

    /// Applies a delete-only batch through the index.
    ///
    /// # Errors
    ///
    /// Batches containing puts are rejected with `InvalidArgument`:
    /// their payloads were never staged in the blob log, so forwarding
    /// them would store garbage locators.
    pub fn write(&self, opts: &WriteOptions, batch: WriteBatch) -> Result<()> {
        if batch
            .ops()
            .iter()
            .any(|op| matches!(op, BatchOp::Put { .. }))
        {
            return Err(Error::InvalidArgument(
                "batched puts bypass the blob log; use put() per key",
            ));
        }

        self.index.write(opts, batch)
    }

    /// Looks up a key; `Ok(None)` means not found.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the locator is malformed or its record
    /// cannot be read back (`BadMagic`, `TruncatedRecord`, I/O).
    pub fn get(&self, opts: &ReadOptions, key: &[u8]) -> Result<Option<UserValue>> {
        let Some(raw) = self.index.get(opts, key)? else {
            return Ok(None);
        };

        let locator = decode_locator_bytes(&raw)?;

        let mut scratch = vec![0u8; locator.read_len];
        let range = self.internal_get(opts, &locator, &mut scratch)?;

        Ok(Some(Slice::new(&scratch[range])))
    }

    /// Whether a locator exists for `key`.
    ///
    /// Cheaper than [`ColumnDb::get`]: the payload is not resolved, so
    /// this proves presence in the index, not readability of the blob.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the index cannot serve the read.
    pub fn exists(&self, opts: &ReadOptions, key: &[u8]) -> Result<bool> {
        Ok(self.index.get(opts, key)?.is_some())
    }

    /// Opens an iterator over all keys; payloads are resolved lazily
    /// on `value()`.
    #[must_use]
    pub fn iter(&self, opts: &ReadOptions) -> ColumnIterator<'_> {
        ColumnIterator::new(self, self.index.iter(opts), *opts)
    }

    /// Takes a snapshot. The engine cannot snapshot the blob side, so
    /// this is always `None`.
    #[must_use]
    pub fn snapshot(&self) -> Option<Snapshot> {
        None
    }

    /// Releases a snapshot. No-op.
    pub fn release_snapshot(&self, snapshot: Snapshot) {
        drop(snapshot);
    }

    /// Persists in-flight index writes.
    ///
    /// Blob durability is controlled per put via
    /// [`WriteOptions::sync`].
    ///
    /// # Errors
    ///
    /// Will return `Err` if the index cannot persist.
    pub fn flush(&self) -> Result<()> {
        self.index.flush()
    }

    /// Reads an index property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<String> {
        self.index.property(name)
    }

    /// Approximate index sizes for key ranges `[start, end)`.
    ///
    /// Counts locators, not payloads; blob bytes are not attributed to
    /// key ranges.
    #[must_use]
    pub fn approximate_sizes(&self, ranges: &[(&[u8], &[u8])]) -> Vec<u64> {
        self.index.approximate_sizes(ranges)
    }

    /// Requests index compaction for the given key range.
    ///
    /// # Errors
    ///
    /// Will return `Err` if compaction setup fails.
    pub fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        self.index.compact_range(begin, end)
    }

    /// Extracts a key range of locators into a file (see
    /// [`IndexDb::bulk_split`]).
    ///
    /// The payloads stay in this engine's blob files, so the extracted
    /// entries are only meaningful to an engine sharing them.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the range cannot be extracted.
    pub fn bulk_split(
        &self,
        opts: &WriteOptions,
        sequence: SeqNo,
        begin: Option<&[u8]>,
        end: Option<&[u8]>,
        path: &Path,
    ) -> Result<()> {
        self.index.bulk_split(opts, sequence, begin, end, path)
    }

    /// Loads previously extracted locators (see
    /// [`IndexDb::bulk_insert`]).
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be loaded.
    pub fn bulk_insert(
        &self,
        opts: &WriteOptions,
        path: &Path,
        min_sequence: SeqNo,
        max_sequence: SeqNo,
    ) -> Result<()> {
        self.index.bulk_insert(opts, path, min_sequence, max_sequence)
    }

    /// Log number of the blob file currently being written.
    #[doc(hidden)]
    #[must_use]
    pub fn current_log_number(&self) -> u64 {
        self.current_log.load(Acquire)
    }

    /// Number of blob file readers the handle cache currently holds.
    #[doc(hidden)]
    #[must_use]
    pub fn open_blob_handles(&self) -> usize {
        self.handle_cache.len()
    }

    /// Resolves a locator into the value range inside `scratch`.
    ///
    /// `scratch` must be `locator.read_len` bytes. The record header
    /// is validated: wrong magic is `BadMagic`, and a record whose
    /// declared sizes exceed what was read is `TruncatedRecord`.
    pub(crate) fn internal_get(
        &self,
        opts: &ReadOptions,
        locator: &Locator,
        scratch: &mut [u8],
    ) -> Result<Range<usize>> {
        let bytes_read = self.read_record(opts, locator, scratch)?;

        if bytes_read < RECORD_HEADER_SIZE {
            return Err(Error::TruncatedRecord);
        }

        let (magic, key_size, value_size) = decode_record_header(read_fixed64(scratch));
        if magic != COLUMN_MAGIC {
            return Err(Error::BadMagic { got: magic });
        }

        if RECORD_HEADER_SIZE + key_size + value_size > bytes_read {
            return Err(Error::TruncatedRecord);
        }

        let start = RECORD_HEADER_SIZE + key_size;
        Ok(start..start + value_size)
    }

    /// Reads the raw record bytes, preferring the mirror.
    ///
    /// Double-checked: the lock-free probe of the current log number
    /// can race a rotation, so it is re-tested under the blob lock; on
    /// mismatch the read falls through to the handle cache, which is
    /// correct because rotated files are immutable.
    fn read_record(
        &self,
        opts: &ReadOptions,
        locator: &Locator,
        scratch: &mut [u8],
    ) -> Result<usize> {
        if locator.log_number == self.current_log.load(Acquire) {
            let blob = self.blob.lock().expect("lock is poisoned");

            if locator.log_number == blob.current_log_number() {
                let offset = usize::try_from(locator.offset)
                    .map_err(|_| Error::InvalidArgument("record offset exceeds address space"))?;
                return blob.membuf().read(offset, scratch);
            }
        }

        let handle = if opts.fill_cache {
            self.handle_cache.get(locator.log_number)?
        } else {
            self.handle_cache.open_uncached(locator.log_number)?
        };

        handle.read_at(locator.offset, scratch).map_err(Error::Io)
    }
}

impl Drop for ColumnDb {
    fn drop(&mut self) {
        if let Ok(mut blob) = self.blob.lock() {
            if let Err(e) = blob.flush() {
                log::error!("failed to flush active blob log on close: {e}");
            }
        }
    }
}

/// The engine is itself an [`IndexDb`], so it can stand wherever its
/// index does.
impl IndexDb for ColumnDb {
    fn put(&self, opts: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        Self::put(self, opts, key, value)
    }

    fn delete(&self, opts: &WriteOptions, key: &[u8]) -> Result<()> {
        Self::delete(self, opts, key)
    }

    fn write(&self, opts: &WriteOptions, batch: WriteBatch) -> Result<()> {
        Self::write(self, opts, batch)
    }

    fn get(&self, opts: &ReadOptions, key: &[u8]) -> Result<Option<UserValue>> {
        Self::get(self, opts, key)
    }

    fn iter<'a>(&'a self, opts: &ReadOptions) -> Box<dyn DbIterator + 'a> {
        Box::new(Self::iter(self, opts))
    }

    fn flush(&self) -> Result<()> {
        Self::flush(self)
    }

    fn property(&self, name: &str) -> Option<String> {
        Self::property(self, name)
    }

    fn approximate_sizes(&self, ranges: &[(&[u8], &[u8])]) -> Vec<u64> {
        Self::approximate_sizes(self, ranges)
    }

    fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()> {
        Self::compact_range(self, begin, end)
    }

    fn bulk_split(
        &self,
        opts: &WriteOptions,
        sequence: SeqNo,
        begin: Option<&[u8]>,
        end: Option<&[u8]>,
        path: &Path,
    ) -> Result<()> {
        Self::bulk_split(self, opts, sequence, begin, end, path)
    }

    fn bulk_insert(
        &self,
        opts: &WriteOptions,
        path: &Path,
        min_sequence: SeqNo,
        max_sequence: SeqNo,
    ) -> Result<()> {
        Self::bulk_insert(self, opts, path, min_sequence, max_sequence)
    }

    fn snapshot(&self) -> Option<Snapshot> {
        Self::snapshot(self)
    }

    fn release_snapshot(&self, snapshot: Snapshot) {
        Self::release_snapshot(self, snapshot);
    }
}

/// Seeds the log-number counter at open.
///
/// Scans the blob directory (if it exists) for `.dat` files and picks
/// a counter above every number seen, within this server's reserved
/// space. Malformed names are logged and skipped.
fn recover_log_number(env: &dyn Env, blob_dir: &Path, server_id: u32) -> u64 {
    let seed = u64::from(server_id) << SERVER_ID_SHIFT;

    if !env.file_exists(blob_dir) {
        log::debug!(
            "blob directory {} does not exist yet, seeding log counter with {seed}",
            blob_dir.display(),
        );
        return seed;
    }

    let names = match env.get_children(blob_dir) {
        Ok(names) => names,
        Err(e) => {
            log::warn!("cannot list blob directory {}: {e}", blob_dir.display());
            return seed;
        }
    };

    let mut max_seen = seed;

    for name in names {
        if !name.ends_with(BLOB_FILE_SUFFIX) {
            continue;
        }

        match parse_blob_file_name(&name) {
            Some(number) => max_seen = max_seen.max(number),
            None => log::warn!("skipping malformed blob file name {name:?}"),
        }
    }

    log::debug!(
        "recovered blob directory {}, next log number is {}",
        blob_dir.display(),
        max_seen + 1,
    );

    max_seen + 1
}
