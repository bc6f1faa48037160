// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use crate::{
    env::{Env, StdEnv},
    ColumnDb, IndexDb, MemIndex,
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

/// Size of the active-blob mirror, and therefore of every blob file.
///
/// Fixed by the on-disk layout of existing deployments; override only
/// for testing.
pub const DEFAULT_WRITE_BUFFER_SIZE: usize = 63 * 1_024 * 1_024;

const DEFAULT_MAX_OPEN_FILES: usize = 1_000;

/// Highest server id whose shifted log-number seed still fits the
/// locator's 22-bit log-number field.
pub const MAX_SERVER_ID: u32 = 0xFF;

/// Engine configuration builder
#[derive(Clone)]
pub struct Config {
    /// Directory of the index; blob files live next to it, in its
    /// parent directory.
    #[doc(hidden)]
    pub path: PathBuf,

    /// Storage environment to run on.
    #[doc(hidden)]
    pub env: Arc<dyn Env>,

    /// Handle cache capacity.
    #[doc(hidden)]
    pub max_open_files: usize,

    /// Capacity of the active-blob mirror.
    #[doc(hidden)]
    pub write_buffer_size: usize,

    /// Identity of this server; reserves a disjoint log-number space
    /// per server (`server_id << 14`).
    #[doc(hidden)]
    pub server_id: u32,
}

impl Config {
    /// Initializes a new config.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().into(),
            env: Arc::new(StdEnv),
            max_open_files: DEFAULT_MAX_OPEN_FILES,
            write_buffer_size: DEFAULT_WRITE_BUFFER_SIZE,
            server_id: 0,
        }
    }

    /// Sets the storage environment.
    #[must_use]
    pub fn env(mut self, env: Arc<dyn Env>) -> Self {
        self.env = env;
        self
    }

    /// Sets how many blob file readers the handle cache keeps open.
    ///
    /// Defaults to 1000.
    #[must_use]
    pub fn max_open_files(mut self, n: usize) -> Self {
        self.max_open_files = n;
        self
    }

    /// Sets the mirror capacity (= blob file target size).
    ///
    /// Defaults to [`DEFAULT_WRITE_BUFFER_SIZE`]; see its caveat.
    #[must_use]
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.write_buffer_size = bytes;
        self
    }

    /// Sets the server id (at most [`MAX_SERVER_ID`]).
    ///
    /// Defaults to 0.
    #[must_use]
    pub fn server_id(mut self, id: u32) -> Self {
        self.server_id = id;
        self
    }

    /// Opens the engine with a fresh bundled [`MemIndex`].
    ///
    /// # Errors
    ///
    /// Will return `Err` if the engine cannot be opened.
    pub fn open(self) -> crate::Result<ColumnDb> {
        let index = Arc::new(MemIndex::new(self.env.clone()));
        self.open_with_index(index)
    }

    /// Opens the engine over an externally provided index.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the engine cannot be opened.
    pub fn open_with_index(self, index: Arc<dyn IndexDb>) -> crate::Result<ColumnDb> {
        ColumnDb::open(self, index)
    }
}

/// Options for a single write.
#[derive(Clone, Copy, Debug, Default)]
pub struct WriteOptions {
    /// Flush the blob file after appending the payload, making it
    /// durable before the locator is published.
    pub sync: bool,
}

/// Options for a single read.
#[derive(Clone, Copy, Debug)]
pub struct ReadOptions {
    /// Keep the blob file reader cached for later reads.
    ///
    /// Turn off for one-off scans that should not displace hot
    /// handles.
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { fill_cache: true }
    }
}
