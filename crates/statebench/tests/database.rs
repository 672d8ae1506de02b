use std::{sync::Arc, thread};

use statebench::{Database, Error, MemoryDatabase, Result};

#[test]
fn test_missing_key_is_not_found() -> Result<()> {
    let db = MemoryDatabase::new();
    assert!(matches!(db.get(b"absent"), Err(Error::NotFound)));

    let metrics = db.metrics();
    assert_eq!(metrics.read_count, 1);
    assert_eq!(metrics.read_errors, 0);
    Ok(())
}

#[test]
fn test_set_get_and_metrics() -> Result<()> {
    let db = MemoryDatabase::new();
    db.set(b"a", b"12345")?;
    db.set(b"b", b"678")?;
    db.set(b"a", b"0")?;
    assert_eq!(db.get(b"a")?, b"0");
    assert_eq!(db.get(b"b")?, b"678");
    db.flush()?;

    let metrics = db.metrics();
    assert_eq!(metrics.write_count, 3);
    assert_eq!(metrics.read_count, 2);
    assert_eq!(metrics.flush_count, 1);
    assert_eq!(metrics.bytes_written, 9);
    assert_eq!(metrics.bytes_read, 4);
    assert_eq!(metrics.key_count, 2);
    assert_eq!(metrics.data_size, 6);
    Ok(())
}

#[test]
fn test_closed_database_rejects_operations() -> Result<()> {
    let db = MemoryDatabase::new();
    db.set(b"k", b"v")?;
    db.close()?;

    assert!(matches!(db.get(b"k"), Err(Error::Closed)));
    assert!(matches!(db.set(b"k", b"w"), Err(Error::Closed)));
    assert!(matches!(db.flush(), Err(Error::Closed)));

    let metrics = db.metrics();
    assert_eq!(metrics.read_errors, 1);
    assert_eq!(metrics.write_errors, 1);
    assert_eq!(metrics.flush_errors, 1);
    Ok(())
}

#[test]
fn test_concurrent_writers() -> Result<()> {
    let db = Arc::new(MemoryDatabase::new());
    let handles: Vec<_> = (0..4u8)
        .map(|t| {
            let db = db.clone();
            thread::spawn(move || -> Result<()> {
                for i in 0..250u32 {
                    db.set(&[&[t][..], &i.to_be_bytes()].concat(), &[t])?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in handles {
        handle.join().map_err(|_| Error::Str("writer panicked"))??;
    }

    assert_eq!(db.len(), 1_000);
    assert_eq!(db.metrics().write_count, 1_000);
    Ok(())
}
