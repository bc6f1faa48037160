// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use std::path::{Path, PathBuf};

/// File extension of blob log files.
pub const BLOB_FILE_SUFFIX: &str = ".dat";

/// Two-byte tag in front of the log number.
///
/// Recovery parses the decimal digits starting at byte 2 of the base
/// name, so the tag must stay exactly two bytes wide.
const BLOB_FILE_TAG: &str = "bf";

/// Builds the path of the blob file for `log_number`.
///
/// Numbers are zero-padded to six digits (`bf000123.dat`); larger
/// numbers simply widen the name.
#[must_use]
pub fn blob_file_path(prefix: &Path, log_number: u64) -> PathBuf {
    prefix.join(format!("{BLOB_FILE_TAG}{log_number:06}{BLOB_FILE_SUFFIX}"))
}

/// Parses a blob file base name back into its log number.
///
/// Returns `None` for names that do not end in `.dat` or whose digits
/// do not parse.
#[must_use]
pub fn parse_blob_file_name(name: &str) -> Option<u64> {
    let digits = name.strip_suffix(BLOB_FILE_SUFFIX)?.get(BLOB_FILE_TAG.len()..)?;

    if digits.is_empty() {
        return None;
    }

    digits.parse().ok()
}

#[cfg(test)]
#[expect(clippy::unwrap_used)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn blob_file_name_format() {
        assert_eq!(
            blob_file_path(Path::new("/db"), 123),
            PathBuf::from("/db/bf000123.dat"),
        );

        // seven digits once the six-digit field overflows
        assert_eq!(
            blob_file_path(Path::new("/db"), 1_638_400),
            PathBuf::from("/db/bf1638400.dat"),
        );
    }

    #[test]
    fn blob_file_name_roundtrip() {
        for n in [0, 1, 41, 999_999, 1_638_400, (1 << 22) - 1] {
            let path = blob_file_path(Path::new(""), n);
            let name = path.file_name().unwrap().to_str().unwrap();
            assert_eq!(parse_blob_file_name(name), Some(n));
        }
    }

    #[test]
    fn blob_file_name_rejects_garbage() {
        assert_eq!(parse_blob_file_name("MANIFEST"), None);
        assert_eq!(parse_blob_file_name("bf.dat"), None);
        assert_eq!(parse_blob_file_name("bfxxxxxx.dat"), None);
        assert_eq!(parse_blob_file_name("bf000001.tmp"), None);
        assert_eq!(parse_blob_file_name(".dat"), None);
    }
}
