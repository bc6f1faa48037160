use column_db::{env::StdEnv, Config, MemIndex, ReadOptions, WriteOptions};
use std::sync::Arc;
use test_log::test;

// The index is the collaborator's concern, so reopening shares one
// MemIndex; the engine side must recover its log counter and serve old
// payloads from disk.
#[test]
fn reopen_recovers_log_counter() -> column_db::Result<()> {
    let folder = tempfile::tempdir()?;
    let name = folder.path().join("index");

    let index = Arc::new(MemIndex::new(Arc::new(StdEnv)));

    let wopts = WriteOptions { sync: true };
    let ropts = ReadOptions::default();

    let recovered_log = {
        let db = Config::new(&name).open_with_index(index.clone())?;
        db.put(&wopts, b"k", b"v")?;
        db.current_log_number()
    };

    let db = Config::new(&name).open_with_index(index)?;

    // the old payload is no longer mirrored; this read goes to disk
    let value = db.get(&ropts, b"k")?.expect("should exist");
    assert_eq!(&*value, b"v");

    // new writes land in a strictly newer blob file
    assert!(db.current_log_number() > recovered_log);

    db.put(&wopts, b"k2", b"v2")?;
    let value = db.get(&ropts, b"k2")?.expect("should exist");
    assert_eq!(&*value, b"v2");

    Ok(())
}
