use column_db::{Config, ReadOptions, WriteOptions};
use test_log::test;

// Round-robin reads across several closed blob files must never hold
// more than max_open_files readers open.
#[test]
fn handle_cache_respects_max_open_files() -> column_db::Result<()> {
    let folder = tempfile::tempdir()?;

    // each record is 8 + 4 + 16 = 28 bytes; a 56-byte mirror holds two
    let db = Config::new(folder.path().join("index"))
        .write_buffer_size(56)
        .max_open_files(2)
        .open()?;

    let wopts = WriteOptions::default();
    let ropts = ReadOptions::default();

    for i in 0..8 {
        let key = format!("key{i}");
        let value = format!("{i}xxxxxxxxxxxxxxx");
        assert_eq!(value.len(), 16);
        db.put(&wopts, key.as_bytes(), value.as_bytes())?;
    }

    // key0..key5 live in rotated (closed) files; read them 1000 times
    for round in 0..1_000 {
        let i = round % 6;
        let key = format!("key{i}");
        let expected = format!("{i}xxxxxxxxxxxxxxx");

        let value = db.get(&ropts, key.as_bytes())?.expect("should exist");
        assert_eq!(&*value, expected.as_bytes());

        assert!(
            db.open_blob_handles() <= 2,
            "cache exceeded its capacity at round {round}",
        );
    }

    Ok(())
}

// fill_cache=false reads must not displace cached handles.
#[test]
fn uncached_reads_leave_cache_alone() -> column_db::Result<()> {
    let folder = tempfile::tempdir()?;

    let db = Config::new(folder.path().join("index"))
        .write_buffer_size(56)
        .max_open_files(2)
        .open()?;

    let wopts = WriteOptions::default();

    for i in 0..6 {
        let key = format!("key{i}");
        db.put(&wopts, key.as_bytes(), b"0123456789abcdef")?;
    }

    let cached = ReadOptions::default();
    let uncached = ReadOptions { fill_cache: false };

    let _ = db.get(&cached, b"key0")?.expect("should exist");
    let handles = db.open_blob_handles();
    assert!(handles >= 1);

    let _ = db.get(&uncached, b"key2")?.expect("should exist");
    assert_eq!(db.open_blob_handles(), handles);

    Ok(())
}
