// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    config::{ReadOptions, WriteOptions},
    env::Env,
    index::{BatchOp, DbIterator, IndexDb, SeqNo, WriteBatch},
    Error, Result, UserKey, UserValue,
};
use byteorder::{ByteOrder, LittleEndian};
use crossbeam_skiplist::SkipMap;
use std::{ops::Bound, path::Path, sync::Arc};

/// Length-prefix pair in front of every bulk-file entry.
const BULK_ENTRY_HEADER: usize = 2 * std::mem::size_of::<u32>();

/// In-memory ordered index over a lock-free skip list
///
/// A stand-alone [`IndexDb`] so the engine can run without an external
/// LSM. Writes are visible immediately; `flush` and `compact_range`
/// are no-ops. The bulk operations serialize entries into a simple
/// length-prefixed file through the environment; sequence bounds are
/// accepted for interface compatibility and ignored (no MVCC).
pub struct MemIndex {
    items: SkipMap<UserKey, UserValue>,
    env: Arc<dyn Env>,
}

impl MemIndex {
    /// Creates an empty index performing bulk file I/O through `env`.
    #[must_use]
    pub fn new(env: Arc<dyn Env>) -> Self {
        Self {
            items: SkipMap::new(),
            env,
        }
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn range_bounds<'a>(
        begin: Option<&'a [u8]>,
        end: Option<&'a [u8]>,
    ) -> (Bound<&'a [u8]>, Bound<&'a [u8]>) {
        (
            begin.map_or(Bound::Unbounded, Bound::Included),
            end.map_or(Bound::Unbounded, Bound::Excluded),
        )
    }
}

impl IndexDb for MemIndex {
    fn put(&self, _opts: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        self.items.insert(key.into(), value.into());
        Ok(())
    }

    fn delete(&self, _opts: &WriteOptions, key: &[u8]) -> Result<()> {
        self.items.remove(key);
        Ok(())
    }

    fn write(&self, _opts: &WriteOptions, batch: WriteBatch) -> Result<()> {
        for op in batch {
            match op {
                BatchOp::Put { key, value } => {
                    self.items.insert(key, value);
                }
                BatchOp::Delete { key } => {
                    self.items.remove(&key);
                }
            }
        }

        Ok(())
    }

    fn get(&self, _opts: &ReadOptions, key: &[u8]) -> Result<Option<UserValue>> {
        Ok(self.items.get(key).map(|entry| entry.value().clone()))
    }

    fn iter<'a>(&'a self, _opts: &ReadOptions) -> Box<dyn DbIterator + 'a> {
        Box::new(MemIndexIter {
            items: &self.items,
            pos: None,
        })
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn property(&self, name: &str) -> Option<String> {
        match name {
            "memindex.count" => Some(self.items.len().to_string()),
            "memindex.size-bytes" => {
                let bytes: usize = self
                    .items
                    .iter()
                    .map(|entry| entry.key().len() + entry.value().len())
                    .sum();
                Some(bytes.to_string())
            }
            _ => None,
        }
    }

    fn approximate_sizes(&self, ranges: &[(&[u8], &[u8])]) -> Vec<u64> {
        ranges
            .iter()
            .map(|&(start, end)| {
                self.items
                    .range::<[u8], _>((Bound::Included(start), Bound::Excluded(end)))
                    .map(|entry| (entry.key().len() + entry.value().len()) as u64)
                    .sum()
            })
            .collect()
    }

    fn compact_range(&self, _begin: Option<&[u8]>, _end: Option<&[u8]>) -> Result<()> {
        // a skip list has no fragmentation to compact away
        Ok(())
    }

    fn bulk_split(
        &self,
        _opts: &WriteOptions,
        sequence: SeqNo,
        begin: Option<&[u8]>,
        end: Option<&[u8]>,
        path: &Path,
    ) -> Result<()> {
        let mut file = self.env.new_writable_file(path)?;
        let mut moved = vec![];

        for entry in self.items.range::<[u8], _>(Self::range_bounds(begin, end)) {
            let key = entry.key();
            let value = entry.value();

            let mut header = [0u8; BULK_ENTRY_HEADER];
            let key_len = u32::try_from(key.len())
                .map_err(|_| Error::InvalidArgument("bulk entry key exceeds 2^32 - 1 bytes"))?;
            let value_len = u32::try_from(value.len())
                .map_err(|_| Error::InvalidArgument("bulk entry value exceeds 2^32 - 1 bytes"))?;
            LittleEndian::write_u32(&mut header[..4], key_len);
            LittleEndian::write_u32(&mut header[4..], value_len);

            file.append(&header).map_err(Error::Io)?;
            file.append(key).map_err(Error::Io)?;
            file.append(value).map_err(Error::Io)?;

            moved.push(key.clone());
        }

        file.flush().map_err(Error::Io)?;

        log::debug!(
            "bulk split {} entries (sequence {sequence}) into {}",
            moved.len(),
            path.display(),
        );

        for key in moved {
            self.items.remove(&key);
        }

        Ok(())
    }

    fn bulk_insert(
        &self,
        _opts: &WriteOptions,
        path: &Path,
        min_sequence: SeqNo,
        max_sequence: SeqNo,
    ) -> Result<()> {
        let file = self.env.new_random_access_file(path)?;

        let mut offset = 0u64;
        let mut loaded = 0usize;

        loop {
            let mut header = [0u8; BULK_ENTRY_HEADER];
            let n = file.read_at(offset, &mut header).map_err(Error::Io)?;
            if n == 0 {
                break;
            }
            if n < BULK_ENTRY_HEADER {
                return Err(Error::Corruption("bulk file ends inside an entry header"));
            }
            offset += BULK_ENTRY_HEADER as u64;

            let key_len = LittleEndian::read_u32(&header[..4]) as usize;
            let value_len = LittleEndian::read_u32(&header[4..]) as usize;

            let mut body = vec![0u8; key_len + value_len];
            if file.read_at(offset, &mut body).map_err(Error::Io)? != body.len() {
                return Err(Error::Corruption("bulk file ends inside an entry body"));
            }
            offset += body.len() as u64;

            let value = UserValue::new(&body[key_len..]);
            let key = UserKey::new(&body[..key_len]);
            self.items.insert(key, value);
            loaded += 1;
        }

        log::debug!(
            "bulk inserted {loaded} entries (sequences {min_sequence}..={max_sequence}) from {}",
            path.display(),
        );

        Ok(())
    }
}

struct MemIndexIter<'a> {
    items: &'a SkipMap<UserKey, UserValue>,
    pos: Option<(UserKey, UserValue)>,
}

impl MemIndexIter<'_> {
    fn entry_to_pos(
        entry: crossbeam_skiplist::map::Entry<'_, UserKey, UserValue>,
    ) -> (UserKey, UserValue) {
        (entry.key().clone(), entry.value().clone())
    }
}

impl DbIterator for MemIndexIter<'_> {
    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn seek_to_first(&mut self) {
        self.pos = self.items.front().map(Self::entry_to_pos);
    }

    fn seek_to_last(&mut self) {
        self.pos = self.items.back().map(Self::entry_to_pos);
    }

    fn seek(&mut self, target: &[u8]) {
        self.pos = self
            .items
            .lower_bound(Bound::Included(target))
            .map(Self::entry_to_pos);
    }

    fn next(&mut self) {
        let (key, _) = self.pos.take().expect("iterator is not valid");
        self.pos = self
            .items
            .lower_bound(Bound::Excluded(&*key))
            .map(Self::entry_to_pos);
    }

    fn prev(&mut self) {
        let (key, _) = self.pos.take().expect("iterator is not valid");
        self.pos = self
            .items
            .upper_bound(Bound::Excluded(&*key))
            .map(Self::entry_to_pos);
    }

    fn key(&self) -> &[u8] {
        let (key, _) = self.pos.as_ref().expect("iterator is not valid");
        key
    }

    fn value(&mut self) -> UserValue {
        let (_, value) = self.pos.as_ref().expect("iterator is not valid");
        value.clone()
    }

    fn status(&self) -> Result<()> {
        Ok(())
    }
}
