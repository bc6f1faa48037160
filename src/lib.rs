// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! A column-style key-value store that layers an ordered index of
//! locators over rotated, append-only blob logs.
//!
//! ##### About
//!
//! Small variable-length values (think file metadata records) are
//! packed back-to-back into blob files; the index — any LSM-style
//! ordered store behind the [`IndexDb`] trait, with [`MemIndex`]
//! bundled — holds only a fixed 8-byte locator per key. Point reads of
//! keys in the active blob are served from an in-memory mirror without
//! touching disk; older blobs are read through a bounded LRU cache of
//! open file handles. At open, the blob directory is scanned so new
//! blob files never reuse an existing number.
//!
//! Deletes only drop the locator; blob space is never reclaimed.
//! Payload durability is opt-in per write ([`WriteOptions::sync`]).
//! Snapshots over the blob side are unsupported.
//!
//! # Example usage
//!
//! ```
//! use column_db::{Config, ReadOptions, WriteOptions};
//! #
//! # let folder = tempfile::tempdir()?;
//!
//! let db = Config::new(folder.path().join("index")).open()?;
//!
//! let wopts = WriteOptions::default();
//! let ropts = ReadOptions::default();
//!
//! db.put(&wopts, b"my_key", b"my_value")?;
//!
//! let item = db.get(&ropts, b"my_key")?;
//! assert_eq!(Some("my_value".into()), item);
//!
//! db.delete(&wopts, b"my_key")?;
//! assert!(db.get(&ropts, b"my_key")?.is_none());
//! #
//! # Ok::<(), column_db::Error>(())
//! ```

#![forbid(unsafe_code)]
#![deny(clippy::all, missing_docs, clippy::cargo)]
#![deny(clippy::unwrap_used)]
#![warn(clippy::indexing_slicing)]
#![warn(clippy::pedantic, clippy::nursery)]
#![warn(clippy::expect_used)]
#![allow(clippy::missing_const_for_fn)]
#![warn(clippy::multiple_crate_versions)]
#![allow(clippy::option_if_let_else)]

mod blob_writer;

#[doc(hidden)]
pub mod coding;

mod config;
mod db;
mod db_iter;
mod error;

pub mod env;

#[doc(hidden)]
pub mod file;

#[doc(hidden)]
pub mod handle_cache;

mod index;

#[doc(hidden)]
pub mod membuf;

mod mem_index;
mod slice;

/// KV-tuple, typically collected from an iterator
pub type KvPair = (UserKey, UserValue);

#[doc(hidden)]
pub use blob_writer::{BlobWriter, RecordLocation};

pub use {
    config::{Config, ReadOptions, WriteOptions, DEFAULT_WRITE_BUFFER_SIZE, MAX_SERVER_ID},
    db::ColumnDb,
    db_iter::ColumnIterator,
    error::{Error, Result},
    index::{BatchOp, DbIterator, IndexDb, SeqNo, Snapshot, WriteBatch},
    mem_index::MemIndex,
    membuf::MemBuffer,
    slice::{Slice, UserKey, UserValue},
};
