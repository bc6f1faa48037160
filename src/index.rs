// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! The index interface the engine stores locators in.
//!
//! The engine never interprets index values; it writes 8-byte locators
//! under user keys and reads them back. Any LSM (or other ordered
//! key-value store) can sit behind [`IndexDb`]; the crate bundles
//! [`crate::MemIndex`] as a stand-alone implementation.

use crate::{config::ReadOptions, config::WriteOptions, Result, UserKey, UserValue};
use std::path::Path;

/// Sequence number - a monotonically increasing counter
///
/// Used by the bulk operations to bound which entries move.
pub type SeqNo = u64;

/// Opaque snapshot handle.
///
/// The engine does not support snapshots over the blob side; its
/// `snapshot()` always returns `None`.
#[derive(Debug)]
pub struct Snapshot(pub(crate) ());

/// A single operation inside a [`WriteBatch`].
#[derive(Clone, Debug)]
pub enum BatchOp {
    /// Insert a key-value pair.
    Put {
        /// Key to insert
        key: UserKey,
        /// Value to insert
        value: UserValue,
    },

    /// Remove a key.
    Delete {
        /// Key to remove
        key: UserKey,
    },
}

/// An ordered list of operations applied through [`IndexDb::write`].
///
/// The engine only accepts delete-only batches: a batched put would
/// store its raw value where a locator belongs (see
/// [`crate::ColumnDb::write`]).
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an insert.
    pub fn put<K: Into<UserKey>, V: Into<UserValue>>(&mut self, key: K, value: V) {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Queues a removal.
    pub fn delete<K: Into<UserKey>>(&mut self, key: K) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    /// The queued operations in insertion order.
    #[must_use]
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Number of queued operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Drops all queued operations.
    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

impl IntoIterator for WriteBatch {
    type Item = BatchOp;
    type IntoIter = std::vec::IntoIter<BatchOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

/// Cursor over an ordered key space.
///
/// Positioning operations leave the cursor either on an entry
/// (`valid()`) or past either end. `key`/`value` must only be called
/// while valid.
pub trait DbIterator {
    /// Whether the cursor currently sits on an entry.
    fn valid(&self) -> bool;

    /// Positions on the first entry.
    fn seek_to_first(&mut self);

    /// Positions on the last entry.
    fn seek_to_last(&mut self);

    /// Positions on the first entry with key `>= target`.
    fn seek(&mut self, target: &[u8]);

    /// Advances to the next entry.
    ///
    /// # Panics
    ///
    /// May panic if the cursor is not valid.
    fn next(&mut self);

    /// Moves back to the previous entry.
    ///
    /// # Panics
    ///
    /// May panic if the cursor is not valid.
    fn prev(&mut self);

    /// Key of the current entry.
    ///
    /// # Panics
    ///
    /// May panic if the cursor is not valid.
    fn key(&self) -> &[u8];

    /// Value of the current entry.
    ///
    /// Takes `&mut self` so implementations may resolve lazily and
    /// cache until the next positioning operation.
    ///
    /// # Panics
    ///
    /// May panic if the cursor is not valid.
    fn value(&mut self) -> UserValue;

    /// Deferred error state of the cursor, if any.
    ///
    /// # Errors
    ///
    /// Returns the first error the cursor ran into while positioning.
    fn status(&self) -> Result<()>;
}

/// The ordered key-value store holding locators.
///
/// Mirrors a `LevelDB`-style `DB` interface. Implementations provide
/// their own synchronization; the engine calls in without holding its
/// own lock.
pub trait IndexDb: Send + Sync {
    /// Inserts `key -> value`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the store cannot apply the write.
    fn put(&self, opts: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()>;

    /// Removes `key`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the store cannot apply the write.
    fn delete(&self, opts: &WriteOptions, key: &[u8]) -> Result<()>;

    /// Applies a batch of operations.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the store cannot apply the batch.
    fn write(&self, opts: &WriteOptions, batch: WriteBatch) -> Result<()>;

    /// Looks `key` up; `Ok(None)` means not found.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the store cannot serve the read.
    fn get(&self, opts: &ReadOptions, key: &[u8]) -> Result<Option<UserValue>>;

    /// Opens a cursor over the whole key space.
    fn iter<'a>(&'a self, opts: &ReadOptions) -> Box<dyn DbIterator + 'a>;

    /// Persists in-flight writes.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the store cannot persist.
    fn flush(&self) -> Result<()>;

    /// Reads an implementation-defined property.
    fn property(&self, name: &str) -> Option<String>;

    /// Approximate on-disk byte sizes for key ranges `[start, end)`.
    fn approximate_sizes(&self, ranges: &[(&[u8], &[u8])]) -> Vec<u64>;

    /// Requests compaction of the given key range (`None` = open end).
    ///
    /// # Errors
    ///
    /// Will return `Err` if compaction setup fails.
    fn compact_range(&self, begin: Option<&[u8]>, end: Option<&[u8]>) -> Result<()>;

    /// Extracts the key range `[begin, end)` into the file at `path`
    /// and removes it from the store.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the range cannot be extracted.
    fn bulk_split(
        &self,
        opts: &WriteOptions,
        sequence: SeqNo,
        begin: Option<&[u8]>,
        end: Option<&[u8]>,
        path: &Path,
    ) -> Result<()>;

    /// Loads entries previously extracted into the file at `path`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be loaded.
    fn bulk_insert(
        &self,
        opts: &WriteOptions,
        path: &Path,
        min_sequence: SeqNo,
        max_sequence: SeqNo,
    ) -> Result<()>;

    /// Takes a snapshot, if the store supports them.
    fn snapshot(&self) -> Option<Snapshot> {
        None
    }

    /// Releases a snapshot taken earlier.
    fn release_snapshot(&self, snapshot: Snapshot) {
        drop(snapshot);
    }
}
