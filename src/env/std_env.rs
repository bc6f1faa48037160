// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

use super::{Env, RandomAccessFile, WritableFile};
use crate::Result;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};

/// Standard environment backed by `std::fs`.
///
/// Writers are buffered; `flush` pushes the buffer down and calls
/// `fdatasync`, which is what per-put durability means here. Missing
/// parent directories are created when the first writable file is
/// opened.
#[derive(Clone, Copy, Debug, Default)]
pub struct StdEnv;

struct StdWritableFile {
    writer: BufWriter<File>,
}

impl WritableFile for StdWritableFile {
    fn append(&mut self, data: &[u8]) -> std::io::Result<()> {
        self.writer.write_all(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()
    }
}

struct StdRandomAccessFile {
    file: File,
}

impl RandomAccessFile for StdRandomAccessFile {
    // pread-style loop; a short count only means EOF
    fn read_at(&self, offset: u64, scratch: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;

        while filled < scratch.len() {
            let n = read_at_impl(&self.file, &mut scratch[filled..], offset + filled as u64)?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(filled)
    }
}

#[cfg(unix)]
fn read_at_impl(file: &File, scratch: &mut [u8], offset: u64) -> std::io::Result<usize> {
    std::os::unix::fs::FileExt::read_at(file, scratch, offset)
}

#[cfg(windows)]
fn read_at_impl(file: &File, scratch: &mut [u8], offset: u64) -> std::io::Result<usize> {
    std::os::windows::fs::FileExt::seek_read(file, scratch, offset)
}

impl Env for StdEnv {
    fn new_writable_file(&self, path: &Path) -> Result<Box<dyn WritableFile>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(crate::Error::Io)?;
        }

        let file = File::create(path).map_err(crate::Error::Io)?;

        Ok(Box::new(StdWritableFile {
            writer: BufWriter::new(file),
        }))
    }

    fn new_random_access_file(&self, path: &Path) -> Result<Arc<dyn RandomAccessFile>> {
        let file = File::open(path).map_err(crate::Error::Io)?;
        Ok(Arc::new(StdRandomAccessFile { file }))
    }

    fn file_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn get_children(&self, path: &Path) -> Result<Vec<String>> {
        let mut names = vec![];

        for dirent in std::fs::read_dir(path).map_err(crate::Error::Io)? {
            let dirent = dirent.map_err(crate::Error::Io)?;
            let file_name = dirent.file_name();

            match file_name.into_string() {
                Ok(name) => names.push(name),
                Err(name) => log::warn!("skipping non-UTF-8 directory entry {name:?}"),
            }
        }

        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn std_env_write_then_read_at() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("sub").join("file");

        let env = StdEnv;

        {
            let mut file = env.new_writable_file(&path)?;
            file.append(b"hello ")?;
            file.append(b"world")?;
            file.flush()?;
        }

        let reader = env.new_random_access_file(&path)?;

        let mut scratch = [0u8; 5];
        assert_eq!(reader.read_at(6, &mut scratch)?, 5);
        assert_eq!(&scratch, b"world");

        // reads crossing EOF are short, not errors
        let mut scratch = [0u8; 64];
        assert_eq!(reader.read_at(6, &mut scratch)?, 5);

        Ok(())
    }

    #[test]
    fn std_env_children() -> crate::Result<()> {
        let dir = tempfile::tempdir()?;
        let env = StdEnv;

        env.new_writable_file(&dir.path().join("a"))?;
        env.new_writable_file(&dir.path().join("b"))?;

        let mut names = env.get_children(dir.path())?;
        names.sort();
        assert_eq!(names, ["a", "b"]);

        assert!(env.file_exists(dir.path()));
        assert!(!env.file_exists(&dir.path().join("nope")));

        Ok(())
    }

    #[test]
    fn std_env_open_missing_file() {
        let env = StdEnv;
        assert!(env
            .new_random_access_file(Path::new("/definitely/not/here"))
            .is_err());
    }
}
