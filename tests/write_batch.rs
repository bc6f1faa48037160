use column_db::{Config, Error, ReadOptions, WriteBatch, WriteOptions};
use test_log::test;

// A batched put would store its raw value where a locator belongs, so
// the engine refuses the whole batch.
#[test]
fn batched_puts_are_rejected() -> column_db::Result<()> {
    let folder = tempfile::tempdir()?;

    let db = Config::new(folder.path().join("index")).open()?;

    let wopts = WriteOptions::default();
    let ropts = ReadOptions::default();

    db.put(&wopts, b"a", b"1")?;

    let mut batch = WriteBatch::new();
    batch.delete("a");
    batch.put("b", "2");

    assert!(matches!(
        db.write(&wopts, batch),
        Err(Error::InvalidArgument(_)),
    ));

    // nothing from the rejected batch was applied
    assert!(db.exists(&ropts, b"a")?);
    assert!(!db.exists(&ropts, b"b")?);

    Ok(())
}

#[test]
fn delete_only_batches_are_forwarded() -> column_db::Result<()> {
    let folder = tempfile::tempdir()?;

    let db = Config::new(folder.path().join("index")).open()?;

    let wopts = WriteOptions::default();
    let ropts = ReadOptions::default();

    db.put(&wopts, b"a", b"1")?;
    db.put(&wopts, b"b", b"2")?;
    db.put(&wopts, b"c", b"3")?;

    let mut batch = WriteBatch::new();
    batch.delete("a");
    batch.delete("c");

    db.write(&wopts, batch)?;

    assert!(!db.exists(&ropts, b"a")?);
    assert!(db.exists(&ropts, b"b")?);
    assert!(!db.exists(&ropts, b"c")?);

    Ok(())
}
