use column_db::{Config, ReadOptions, WriteOptions};
use test_log::test;

// Writers on disjoint keys racing readers across rotations.
#[test]
fn concurrent_writers_and_readers() -> column_db::Result<()> {
    let folder = tempfile::tempdir()?;

    let db = Config::new(folder.path().join("index"))
        .write_buffer_size(256)
        .max_open_files(4)
        .open()?;

    let ropts = ReadOptions::default();

    std::thread::scope(|scope| {
        for t in 0..4 {
            let db = &db;

            scope.spawn(move || {
                let wopts = WriteOptions::default();
                let ropts = ReadOptions::default();

                for i in 0..100 {
                    let key = format!("t{t}-key{i:03}");
                    let value = format!("t{t}-value{i:03}-{}", "x".repeat(16));

                    db.put(&wopts, key.as_bytes(), value.as_bytes())
                        .expect("put should succeed");

                    // read back own writes; may hit mirror or cache
                    let read = db
                        .get(&ropts, key.as_bytes())
                        .expect("get should succeed")
                        .expect("own write should be visible");
                    assert_eq!(&*read, value.as_bytes());
                }
            });
        }
    });

    // every write from every thread is intact
    for t in 0..4 {
        for i in 0..100 {
            let key = format!("t{t}-key{i:03}");
            let expected = format!("t{t}-value{i:03}-{}", "x".repeat(16));

            let value = db.get(&ropts, key.as_bytes())?.expect("should exist");
            assert_eq!(&*value, expected.as_bytes());
        }
    }

    Ok(())
}
