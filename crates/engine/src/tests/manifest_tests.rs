use super::helpers::*;
use crate::manifest::Manifest;
use crate::*;
use anyhow::Result;
use std::fs;
use tempfile::tempdir;

// --------------------- Manifest file ---------------------

#[test]
fn save_and_load_roundtrip() -> Result<()> {
    let dir = tempdir()?;
    let mut manifest = Manifest::empty(dir.path());
    manifest.add(3);
    manifest.add(1);
    manifest.add(7);
    manifest.observe_timestamp(99);
    manifest.save()?;

    let loaded = Manifest::load(dir.path())?.unwrap();
    assert_eq!(loaded.generations(), &[1, 3, 7]);
    assert_eq!(loaded.max_generation(), Some(7));
    assert_eq!(loaded.max_timestamp(), 99);
    assert!(!dir.path().join("MANIFEST.tmp").exists());
    Ok(())
}

#[test]
fn missing_manifest_loads_as_none() -> Result<()> {
    let dir = tempdir()?;
    assert!(Manifest::load(dir.path())?.is_none());
    Ok(())
}

#[test]
fn comments_and_blank_lines_are_skipped() -> Result<()> {
    let dir = tempdir()?;
    fs::write(
        dir.path().join(MANIFEST_FILENAME),
        "# header\n\n  5  \n# note\n2\n",
    )?;
    let loaded = Manifest::load(dir.path())?.unwrap();
    assert_eq!(loaded.generations(), &[2, 5]);
    assert_eq!(loaded.max_timestamp(), 0);
    Ok(())
}

#[test]
fn garbage_line_is_an_error() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join(MANIFEST_FILENAME), "1\nL0:foo.sst\n").unwrap();
    let err = Manifest::load(dir.path()).unwrap_err();
    assert!(format!("{:#}", err).contains("line 2"));
}

#[test]
fn replace_all_keeps_only_one_generation() {
    let dir = tempdir().unwrap();
    let mut manifest = Manifest::empty(dir.path());
    manifest.add(1);
    manifest.add(2);
    manifest.replace_all(3);
    assert_eq!(manifest.generations(), &[3]);
}

#[test]
fn timestamp_floor_never_decreases() {
    let dir = tempdir().unwrap();
    let mut manifest = Manifest::empty(dir.path());
    manifest.observe_timestamp(10);
    manifest.observe_timestamp(4);
    assert_eq!(manifest.max_timestamp(), 10);
}

// --------------------- Engine integration ---------------------

#[test]
fn flush_records_generation_in_manifest() -> Result<()> {
    let dir = tempdir()?;
    let engine = open(dir.path())?;

    put(&engine, "a", "1")?;
    engine.flush()?;
    put(&engine, "b", "2")?;
    engine.flush()?;

    let manifest = Manifest::load(dir.path())?.unwrap();
    assert_eq!(manifest.generations(), &[1, 2]);
    assert!(manifest.max_timestamp() >= 1);
    Ok(())
}

#[test]
fn manifest_decides_live_set_over_directory() -> Result<()> {
    let dir = tempdir()?;
    {
        let engine = open(dir.path())?;
        put(&engine, "a", "1")?;
        engine.flush()?;
        engine.close()?;
    }

    // A valid table the manifest does not know about.
    sstable::SSTableWriter::write(
        &table_path(dir.path(), 9),
        std::iter::empty::<sstable::Result<memtable::Cell>>(),
    )?;

    let engine = open(dir.path())?;
    assert_eq!(engine.generations(), vec![1]);
    assert_eq!(engine.next_generation(), 10, "orphans still reserve their generation");
    Ok(())
}

#[test]
fn bootstrap_from_table_files_without_manifest() -> Result<()> {
    let dir = tempdir()?;
    {
        let engine = open(dir.path())?;
        put(&engine, "a", "1")?;
        engine.flush()?;
        put(&engine, "a", "2")?;
        put(&engine, "b", "3")?;
        engine.flush()?;
        engine.close()?;
    }
    fs::remove_file(dir.path().join(MANIFEST_FILENAME))?;

    let engine = open(dir.path())?;
    assert_eq!(engine.generations(), vec![1, 2]);
    assert!(dir.path().join(MANIFEST_FILENAME).exists());
    assert_eq!(scan_strings(&engine, "")?, expect(&[("a", "2"), ("b", "3")]));

    // The rebuilt manifest also restored the timestamp floor.
    put(&engine, "a", "4")?;
    assert_eq!(scan_strings(&engine, "")?, expect(&[("a", "4"), ("b", "3")]));
    Ok(())
}

#[test]
fn missing_listed_table_fails_open() -> Result<()> {
    let dir = tempdir()?;
    {
        let engine = open(dir.path())?;
        put(&engine, "a", "1")?;
        engine.close()?;
    }
    fs::remove_file(table_path(dir.path(), 1))?;

    assert!(open(dir.path()).is_err());
    Ok(())
}
