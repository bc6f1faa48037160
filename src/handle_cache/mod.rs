// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

mod lru;

use crate::{
    env::{Env, RandomAccessFile},
    file::blob_file_path,
    Result,
};
use lru::LruList;
use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};
use xxhash_rust::xxh3::Xxh3Builder;

/// The handle cache keeps readers of closed blob files open to avoid
/// `open()` calls on every point read
///
/// Bounded LRU from log number to a shared positional reader. Handles
/// are reference counted; a handle stays usable after eviction until
/// its last clone is dropped. Thread-safe.
///
/// See `TableCache` in `LevelDB`.
pub struct HandleCache {
    env: Arc<dyn Env>,
    prefix: PathBuf,
    limit: usize,
    inner: Mutex<HandleCacheInner>,
}

struct HandleCacheInner {
    table: HashMap<u64, Arc<dyn RandomAccessFile>, Xxh3Builder>,
    lru: LruList<u64>,
}

impl HandleCache {
    /// Creates a cache holding at most `limit` open readers under `prefix`.
    #[must_use]
    pub fn new(env: Arc<dyn Env>, prefix: PathBuf, limit: usize) -> Self {
        Self {
            env,
            prefix,
            limit: limit.max(1),
            inner: Mutex::new(HandleCacheInner {
                table: HashMap::with_capacity_and_hasher(16, Xxh3Builder::new()),
                lru: LruList::with_capacity(16),
            }),
        }
    }

    /// Returns the reader for blob file `log_number`, opening it on miss.
    ///
    /// # Errors
    ///
    /// An open failure surfaces unchanged and inserts nothing.
    pub fn get(&self, log_number: u64) -> Result<Arc<dyn RandomAccessFile>> {
        let mut inner = self.inner.lock().expect("lock is poisoned");

        if let Some(handle) = inner.table.get(&log_number) {
            let handle = handle.clone();
            inner.lru.refresh(log_number);
            return Ok(handle);
        }

        let path = blob_file_path(&self.prefix, log_number);
        let handle = self.env.new_random_access_file(&path)?;

        inner.table.insert(log_number, handle.clone());
        inner.lru.refresh(log_number);

        while inner.table.len() > self.limit {
            let Some(victim) = inner.lru.pop_least_recently_used() else {
                break;
            };

            // the entry just inserted sits at the hot end; never evict it
            if victim == log_number {
                inner.lru.refresh(victim);
                continue;
            }

            inner.table.remove(&victim);
            log::trace!("evicted blob handle #{victim}");
        }

        Ok(handle)
    }

    /// Opens a one-shot reader without populating the cache.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be opened.
    pub fn open_uncached(&self, log_number: u64) -> Result<Arc<dyn RandomAccessFile>> {
        let path = blob_file_path(&self.prefix, log_number);
        self.env.new_random_access_file(&path)
    }

    /// Drops the cached reader for `log_number`, if any.
    pub fn evict(&self, log_number: u64) {
        let mut inner = self.inner.lock().expect("lock is poisoned");
        inner.table.remove(&log_number);
        inner.lru.remove(&log_number);
    }

    /// Number of currently cached readers.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("lock is poisoned").table.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
