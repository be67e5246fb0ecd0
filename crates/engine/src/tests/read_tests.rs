use super::helpers::*;
use crate::*;
use anyhow::Result;
use tempfile::tempdir;

// -------------------- Scan --------------------

#[test]
fn scan_empty_engine() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;
    assert!(engine.scan(b"")?.next().is_none());
    Ok(())
}

#[test]
fn scan_from_key_skips_smaller_keys() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;

    for k in ["a", "c", "e", "g"] {
        put(&engine, k, k)?;
    }
    engine.flush()?;
    put(&engine, "d", "d")?;

    assert_eq!(
        scan_strings(&engine, "c")?,
        expect(&[("c", "c"), ("d", "d"), ("e", "e"), ("g", "g")])
    );
    assert_eq!(scan_strings(&engine, "f")?, expect(&[("g", "g")]));
    assert!(scan_strings(&engine, "h")?.is_empty());
    Ok(())
}

#[test]
fn scenario_memtable_overrides_flushed_value() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;

    put(&engine, "k", "v1")?;
    engine.flush()?;
    put(&engine, "k", "v2")?;

    assert_eq!(scan_strings(&engine, "")?, expect(&[("k", "v2")]));
    Ok(())
}

#[test]
fn newer_table_overrides_older_table() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;

    put(&engine, "k", "old")?;
    put(&engine, "other", "x")?;
    engine.flush()?;
    put(&engine, "k", "new")?;
    engine.flush()?;

    assert_eq!(engine.table_count(), 2);
    assert_eq!(
        scan_strings(&engine, "")?,
        expect(&[("k", "new"), ("other", "x")])
    );
    Ok(())
}

#[test]
fn tombstone_in_memtable_hides_table_value() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;

    put(&engine, "a", "1")?;
    put(&engine, "b", "2")?;
    engine.flush()?;
    del(&engine, "a")?;

    assert_eq!(scan_strings(&engine, "")?, expect(&[("b", "2")]));
    Ok(())
}

#[test]
fn value_written_after_tombstone_is_visible() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;

    put(&engine, "k", "1")?;
    engine.flush()?;
    del(&engine, "k")?;
    engine.flush()?;
    put(&engine, "k", "2")?;
    engine.flush()?;

    assert_eq!(scan_strings(&engine, "")?, expect(&[("k", "2")]));
    Ok(())
}

#[test]
fn scan_is_a_point_in_time_snapshot() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;

    put(&engine, "a", "1")?;
    put(&engine, "b", "2")?;
    put(&engine, "c", "3")?;

    let mut scan = engine.scan(b"")?;
    let first = scan.next().unwrap()?;
    assert_eq!(first, (b"a".to_vec(), b"1".to_vec()));

    // Mutate, flush, and compact while the scan is open.
    del(&engine, "b")?;
    put(&engine, "bb", "new")?;
    put(&engine, "c", "changed")?;
    engine.flush()?;
    engine.compact()?;

    let rest: Vec<_> = scan.collect::<Result<_>>()?;
    assert_eq!(
        rest,
        vec![
            (b"b".to_vec(), b"2".to_vec()),
            (b"c".to_vec(), b"3".to_vec()),
        ]
    );

    assert_eq!(
        scan_strings(&engine, "")?,
        expect(&[("a", "1"), ("bb", "new"), ("c", "changed")])
    );
    Ok(())
}

#[test]
fn snapshot_survives_compaction_of_its_tables() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;

    for i in 0..50 {
        put(&engine, &format!("k{:03}", i), "v")?;
        if i % 10 == 9 {
            engine.flush()?;
        }
    }
    let scan = engine.scan(b"")?;
    engine.compact()?;
    assert_eq!(engine.table_count(), 1);

    assert_eq!(scan.count(), 50);
    Ok(())
}

#[test]
fn scan_is_restartable_from_any_key() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;

    for i in 0..30 {
        put(&engine, &format!("k{:02}", i), &i.to_string())?;
        if i % 7 == 0 {
            engine.flush()?;
        }
    }
    let full = scan_strings(&engine, "")?;
    assert_eq!(full.len(), 30);

    for i in 0..31 {
        let from = format!("k{:02}", i);
        let expected: Vec<_> = full.iter().filter(|(k, _)| *k >= from).cloned().collect();
        assert_eq!(scan_strings(&engine, &from)?, expected);
    }
    Ok(())
}

#[test]
fn corrupt_table_surfaces_typed_error() -> Result<()> {
    let dir = tempdir()?;
    {
        let engine = open(dir.path())?;
        put(&engine, "a", "1")?;
        engine.close()?;
    }

    // Footer claims far more rows than the file holds.
    let path = dir.path().join("1.dat");
    let mut bytes = std::fs::read(&path)?;
    let len = bytes.len();
    bytes[len - 4..].copy_from_slice(&1000i32.to_be_bytes());
    std::fs::write(&path, bytes)?;

    let err = open(dir.path()).unwrap_err();
    let typed = err
        .downcast_ref::<sstable::SstableError>()
        .expect("typed sstable error");
    assert!(typed.is_corruption());
    Ok(())
}
