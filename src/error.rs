// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

/// Represents errors that can occur in the column store
#[derive(Debug)]
pub enum Error {
    /// I/O error
    Io(std::io::Error),

    /// A record header did not carry the expected magic number
    ///
    /// The locator pointed at bytes that are not the start of a record.
    BadMagic {
        /// The magic number that was actually read
        got: u16,
    },

    /// A record read returned fewer bytes than its header declares
    ///
    /// The blob file was truncated, or the locator is stale.
    TruncatedRecord,

    /// The mirror buffer has no room left for the record
    ///
    /// Handled internally by rotating the blob log; only surfaces for
    /// records larger than the whole write buffer.
    BufferFull,

    /// A caller argument is unusable (e.g. an oversized key or value)
    InvalidArgument(&'static str),

    /// Stored data is malformed (e.g. a locator that is not 8 bytes)
    Corruption(&'static str),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ColumnDbError: {self:?}")
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// Column store result
pub type Result<T> = std::result::Result<T, Error>;
