// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    coding::decode_locator_bytes,
    config::ReadOptions,
    index::DbIterator,
    ColumnDb, Slice, UserValue,
};

/// Initial scratch size; grown on demand, never shrunk.
const DEFAULT_SCRATCH_SIZE: usize = 4_096;

/// Iterator over the engine's keys with lazily resolved payloads
///
/// Walks the index; a record is only read back from the mirror or a
/// blob file when `value()` is called, and the result is cached until
/// the next positioning operation. One scratch buffer is reused across
/// records.
///
/// A payload that cannot be resolved (truncated file, stale locator)
/// yields an empty slice while the iterator stays valid; `status()`
/// only reflects index-side errors.
pub struct ColumnIterator<'a> {
    db: &'a ColumnDb,
    inner: Box<dyn DbIterator + 'a>,
    opts: ReadOptions,
    scratch: Vec<u8>,
    cached: Option<UserValue>,
}

impl<'a> ColumnIterator<'a> {
    pub(crate) fn new(db: &'a ColumnDb, inner: Box<dyn DbIterator + 'a>, opts: ReadOptions) -> Self {
        Self {
            db,
            inner,
            opts,
            scratch: vec![0; DEFAULT_SCRATCH_SIZE],
            cached: None,
        }
    }

    /// Raw key of the underlying index entry.
    ///
    /// # Panics
    ///
    /// May panic if the cursor is not valid.
    #[must_use]
    pub fn index_key(&self) -> &[u8] {
        self.inner.key()
    }

    /// Raw value of the underlying index entry (the encoded locator).
    ///
    /// # Panics
    ///
    /// May panic if the cursor is not valid.
    #[must_use]
    pub fn index_value(&mut self) -> UserValue {
        self.inner.value()
    }

    fn load_value(&mut self) -> UserValue {
        let raw = self.inner.value();

        let locator = match decode_locator_bytes(&raw) {
            Ok(locator) => locator,
            Err(e) => {
                log::warn!("cannot decode locator during scan: {e}");
                return Slice::empty();
            }
        };

        if locator.read_len > self.scratch.len() {
            self.scratch.resize(locator.read_len, 0);
        }

        match self
            .db
            .internal_get(&self.opts, &locator, &mut self.scratch[..locator.read_len])
        {
            Ok(range) => Slice::new(&self.scratch[range]),
            Err(e) => {
                log::warn!("cannot resolve record payload during scan: {e}");
                Slice::empty()
            }
        }
    }
}

impl DbIterator for ColumnIterator<'_> {
    fn valid(&self) -> bool {
        self.inner.valid()
    }

    fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
        self.cached = None;
    }

    fn seek_to_last(&mut self) {
        self.inner.seek_to_last();
        self.cached = None;
    }

    fn seek(&mut self, target: &[u8]) {
        self.inner.seek(target);
        self.cached = None;
    }

    fn next(&mut self) {
        self.inner.next();
        self.cached = None;
    }

    fn prev(&mut self) {
        self.inner.prev();
        self.cached = None;
    }

    fn key(&self) -> &[u8] {
        self.inner.key()
    }

    fn value(&mut self) -> UserValue {
        assert!(self.inner.valid(), "iterator is not valid");

        if self.cached.is_none() {
            let value = self.load_value();
            self.cached = Some(value);
        }

        match &self.cached {
            Some(value) => value.clone(),
            None => Slice::empty(),
        }
    }

    fn status(&self) -> crate::Result<()> {
        self.inner.status()
    }
}
