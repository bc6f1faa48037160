use column_db::{env::StdEnv, Config, Error, MemIndex, ReadOptions, WriteOptions};
use std::sync::Arc;
use test_log::test;

// Flipping a magic byte on disk must surface as BadMagic, not as a
// garbage value. The engine is reopened first so the read is served
// from the blob file instead of the mirror.
#[test]
fn corrupted_magic_is_detected() -> column_db::Result<()> {
    let folder = tempfile::tempdir()?;
    let name = folder.path().join("index");

    let index = Arc::new(MemIndex::new(Arc::new(StdEnv)));

    {
        let db = Config::new(&name).open_with_index(index.clone())?;
        db.put(&WriteOptions { sync: true }, b"k", b"v")?;
    }

    // exactly one blob file was written; flip the first magic byte of
    // the record at offset 0 (bytes 6..8 of the little-endian header)
    let blob_path = std::fs::read_dir(folder.path())?
        .filter_map(|dirent| {
            let path = dirent.ok()?.path();
            path.extension()
                .is_some_and(|ext| ext == "dat")
                .then_some(path)
        })
        .next()
        .expect("should have written a blob file");

    let mut contents = std::fs::read(&blob_path)?;
    contents[6] ^= 0xFF;
    std::fs::write(&blob_path, contents)?;

    let db = Config::new(&name).open_with_index(index)?;

    assert!(matches!(
        db.get(&ReadOptions::default(), b"k"),
        Err(Error::BadMagic { .. }),
    ));

    // the locator itself is still present
    assert!(db.exists(&ReadOptions::default(), b"k")?);

    Ok(())
}

// A blob file cut short mid-record must surface as TruncatedRecord.
#[test]
fn truncated_record_is_detected() -> column_db::Result<()> {
    let folder = tempfile::tempdir()?;
    let name = folder.path().join("index");

    let index = Arc::new(MemIndex::new(Arc::new(StdEnv)));

    {
        let db = Config::new(&name).open_with_index(index.clone())?;
        db.put(&WriteOptions { sync: true }, b"key", b"a value of some length")?;
    }

    let blob_path = std::fs::read_dir(folder.path())?
        .filter_map(|dirent| {
            let path = dirent.ok()?.path();
            path.extension()
                .is_some_and(|ext| ext == "dat")
                .then_some(path)
        })
        .next()
        .expect("should have written a blob file");

    let contents = std::fs::read(&blob_path)?;
    std::fs::write(&blob_path, &contents[..contents.len() - 5])?;

    let db = Config::new(&name).open_with_index(index)?;

    assert!(matches!(
        db.get(&ReadOptions::default(), b"key"),
        Err(Error::TruncatedRecord),
    ));

    Ok(())
}
