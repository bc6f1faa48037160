// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Storage environment abstraction.
//!
//! The engine performs all blob file I/O through [`Env`], so it can be
//! pointed at local disk, a distributed file system, or an in-memory
//! fake. [`StdEnv`] is the `std::fs` implementation.

mod std_env;

pub use std_env::StdEnv;

use crate::Result;
use std::{path::Path, sync::Arc};

/// An append-only file being written.
pub trait WritableFile: Send {
    /// Appends `data` at the end of the file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn append(&mut self, data: &[u8]) -> std::io::Result<()>;

    /// Flushes buffered writes down to the storage device.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn flush(&mut self) -> std::io::Result<()>;
}

/// An immutable file being read at arbitrary positions.
pub trait RandomAccessFile: Send + Sync {
    /// Reads up to `scratch.len()` bytes starting at `offset`.
    ///
    /// Returns how many bytes were read; reads crossing the end of the
    /// file return short counts, not errors.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn read_at(&self, offset: u64, scratch: &mut [u8]) -> std::io::Result<usize>;
}

/// Storage environment the engine runs on.
pub trait Env: Send + Sync {
    /// Creates (or truncates) a file for appending.
    ///
    /// # Errors
    ///
    /// Will return `Err` if an IO error occurs.
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>>;

    /// Opens an existing file for positional reads.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be opened.
    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>>;

    /// Whether `path` exists.
    fn file_exists(&self, path: &Path) -> bool;

    /// Lists the base names of the children of directory `path`.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the directory cannot be read.
    fn get_children(&self, path: &Path) -> Result<Vec<String>>;
}
