// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Bit-packed codecs for the two fixed 64-bit words of the blob format.
//!
//! Record header (stored in front of every record in a blob file):
//!
//! ```text
//! bits 63..48   magic        (constant 0x18CA)
//! bits 47..20   key size     (28 bits)
//! bits 19..00   value size   (20 bits)
//! ```
//!
//! Locator (stored as the index value under the user key):
//!
//! ```text
//! bits 63..42   log number         (22 bits)
//! bits 41..10   record offset      (32 bits)
//! bits 09..00   rounded size / KiB (10 bits)
//! ```
//!
//! Explicit shifts and masks only; the layout is on-disk format and
//! must not depend on language-level bitfield placement.

use crate::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

/// Magic number carried in the top 16 bits of every record header.
pub const COLUMN_MAGIC: u16 = 0x18CA;

/// On-disk size of a record header.
pub const RECORD_HEADER_SIZE: usize = std::mem::size_of::<u64>();

/// Largest key the 28-bit header field can carry.
pub const MAX_KEY_SIZE: usize = (1 << 28) - 1;

/// Largest value the 20-bit header field can carry.
pub const MAX_VALUE_SIZE: usize = (1 << 20) - 1;

/// Largest total record size the locator's 10-bit rounded-KiB field can carry.
pub const MAX_RECORD_SIZE: usize = 1023 * 1024;

/// Largest log number the locator's 22-bit field can carry.
pub const MAX_LOG_NUMBER: u64 = (1 << 22) - 1;

const HEADER_MAGIC_SHIFT: u32 = 48;
const HEADER_KEY_SHIFT: u32 = 20;
const HEADER_VALUE_MASK: u64 = (1 << 20) - 1;
const HEADER_KEY_MASK: u64 = (1 << 28) - 1;

const LOCATOR_LOG_SHIFT: u32 = 42;
const LOCATOR_OFFSET_SHIFT: u32 = 10;
const LOCATOR_OFFSET_MASK: u64 = u32::MAX as u64;
const LOCATOR_KIB_MASK: u64 = (1 << 10) - 1;

/// A decoded locator, pointing at one record inside one blob file.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Locator {
    /// Identity of the blob file the record lives in.
    pub log_number: u64,

    /// Byte offset of the record header inside that file.
    pub offset: u64,

    /// Read length in bytes (total record size rounded up to whole KiBs).
    pub read_len: usize,
}

/// Packs key and value sizes into a record header word.
///
/// # Errors
///
/// Returns `InvalidArgument` if either size exceeds its field width.
pub fn encode_record_header(key_size: usize, value_size: usize) -> Result<u64> {
    if key_size > MAX_KEY_SIZE {
        return Err(Error::InvalidArgument("key exceeds 2^28 - 1 bytes"));
    }
    if value_size > MAX_VALUE_SIZE {
        return Err(Error::InvalidArgument("value exceeds 2^20 - 1 bytes"));
    }

    Ok((u64::from(COLUMN_MAGIC) << HEADER_MAGIC_SHIFT)
        | ((key_size as u64) << HEADER_KEY_SHIFT)
        | (value_size as u64))
}

/// Unpacks a record header word into `(magic, key_size, value_size)`.
///
/// The caller must reject the record if the magic does not equal
/// [`COLUMN_MAGIC`].
#[must_use]
pub fn decode_record_header(word: u64) -> (u16, usize, usize) {
    #[allow(clippy::cast_possible_truncation)]
    let magic = (word >> HEADER_MAGIC_SHIFT) as u16;
    let key_size = ((word >> HEADER_KEY_SHIFT) & HEADER_KEY_MASK) as usize;
    let value_size = (word & HEADER_VALUE_MASK) as usize;
    (magic, key_size, value_size)
}

/// Packs a record location into a locator word.
///
/// `total_size` is the exact on-disk record size (header + key + value);
/// it is stored rounded up to whole KiBs.
///
/// # Errors
///
/// Returns `InvalidArgument` if any field exceeds its width.
pub fn encode_locator(log_number: u64, offset: u64, total_size: usize) -> Result<u64> {
    if log_number > MAX_LOG_NUMBER {
        return Err(Error::InvalidArgument("log number exceeds 2^22 - 1"));
    }
    if offset > LOCATOR_OFFSET_MASK {
        return Err(Error::InvalidArgument("record offset exceeds 2^32 - 1"));
    }

    let kibs = (total_size as u64 + 1023) / 1024;
    if kibs > LOCATOR_KIB_MASK {
        return Err(Error::InvalidArgument(
            "record exceeds the locator's 1023 KiB size field",
        ));
    }

    Ok((log_number << LOCATOR_LOG_SHIFT) | (offset << LOCATOR_OFFSET_SHIFT) | kibs)
}

/// Unpacks a locator word.
#[must_use]
pub fn decode_locator(word: u64) -> Locator {
    let log_number = word >> LOCATOR_LOG_SHIFT;
    let offset = (word >> LOCATOR_OFFSET_SHIFT) & LOCATOR_OFFSET_MASK;
    let read_len = ((word & LOCATOR_KIB_MASK) * 1024) as usize;

    Locator {
        log_number,
        offset,
        read_len,
    }
}

/// Decodes a locator from its stored little-endian representation.
///
/// # Errors
///
/// Returns `Corruption` if the index value is not exactly 8 bytes.
pub fn decode_locator_bytes(bytes: &[u8]) -> Result<Locator> {
    if bytes.len() != RECORD_HEADER_SIZE {
        return Err(Error::Corruption("locator is not 8 bytes"));
    }
    Ok(decode_locator(LittleEndian::read_u64(bytes)))
}

/// Encodes a `u64` into its stored little-endian representation.
#[must_use]
pub fn fixed64(word: u64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    LittleEndian::write_u64(&mut buf, word);
    buf
}

/// Reads a stored little-endian `u64`.
///
/// # Panics
///
/// Panics if `bytes` is shorter than 8 bytes.
#[must_use]
pub fn read_fixed64(bytes: &[u8]) -> u64 {
    LittleEndian::read_u64(bytes)
}
