//! Cold start: rebuilding the live table set from the base directory.
//!
//! Table files follow one grammar, parsed here and nowhere else:
//!
//! ```text
//! <generation>.dat   a finished table
//! <generation>.tmp   a table still being written (stale after a crash)
//! ```
//!
//! `<generation>` is a decimal `u64` in canonical form (no sign, no leading
//! zeros). Any other file in the directory is ignored.
use anyhow::{Context, Result};
use config::EngineConfig;
use memtable::{Clock, Memtable};
use parking_lot::RwLock;
use sstable::SSTableReader;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::manifest::Manifest;
use crate::{Engine, Inner, LiveTable};

const TABLE_EXTENSION: &str = "dat";
const TMP_EXTENSION: &str = "tmp";

/// A file name that matched the table grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFile {
    /// `<generation>.dat`
    Table(u64),
    /// `<generation>.tmp`
    Temp(u64),
}

impl TableFile {
    pub fn generation(self) -> u64 {
        match self {
            TableFile::Table(g) | TableFile::Temp(g) => g,
        }
    }
}

/// Parses a bare file name against the table grammar.
///
/// ```
/// use engine::{parse_table_name, TableFile};
///
/// assert_eq!(parse_table_name("12.dat"), Some(TableFile::Table(12)));
/// assert_eq!(parse_table_name("3.tmp"), Some(TableFile::Temp(3)));
/// assert_eq!(parse_table_name("012.dat"), None);
/// assert_eq!(parse_table_name("MANIFEST"), None);
/// ```
pub fn parse_table_name(name: &str) -> Option<TableFile> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let generation: u64 = stem.parse().ok()?;
    if generation.to_string() != stem {
        return None;
    }
    match ext {
        TABLE_EXTENSION => Some(TableFile::Table(generation)),
        TMP_EXTENSION => Some(TableFile::Temp(generation)),
        _ => None,
    }
}

/// Path of the table for `generation` inside `dir`.
pub fn table_path(dir: &Path, generation: u64) -> PathBuf {
    dir.join(format!("{}.{}", generation, TABLE_EXTENSION))
}

/// Every file in `dir` that matched the grammar, ascending by generation.
fn list_table_files(dir: &Path) -> Result<Vec<(TableFile, PathBuf)>> {
    let mut files = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let parsed = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_table_name);
        if let Some(file) = parsed {
            files.push((file, path));
        }
    }
    files.sort_by_key(|(file, _)| (file.generation(), matches!(file, TableFile::Temp(_))));
    Ok(files)
}

impl Engine {
    /// Opens (or creates) an engine in `config.dir` with a wall-clock [`Clock`].
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid, the directory cannot be
    /// created or listed, the manifest cannot be parsed, or a live table
    /// fails to open.
    pub fn open(config: EngineConfig) -> Result<Self> {
        Self::open_with_clock(config, Arc::new(Clock::new()))
    }

    /// Like [`open`](Engine::open) but stamps writes with `clock`.
    ///
    /// # Recovery Steps
    ///
    /// 1. Create the base directory if it does not exist.
    /// 2. Remove stale `<generation>.tmp` files from interrupted writes.
    /// 3. Load `MANIFEST`, or bootstrap one from the `<generation>.dat`
    ///    files present if there is none.
    /// 4. Open every table the manifest lists. Table files it does not list
    ///    (orphans of a failed delete) are left alone and ignored.
    /// 5. Resume the generation counter one past the highest generation seen
    ///    in the manifest or on disk.
    /// 6. Advance `clock` past the highest timestamp already persisted, so
    ///    new writes outrank everything on disk.
    pub fn open_with_clock(config: EngineConfig, clock: Arc<Clock>) -> Result<Self> {
        config.validate()?;
        let dir = config.dir.clone();

        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;

        let files = list_table_files(&dir)?;
        remove_stale_tmp_files(&files);

        let manifest = match Manifest::load(&dir)? {
            Some(manifest) => manifest,
            None => bootstrap_manifest(&dir, &files)?,
        };

        let mut tables = Vec::with_capacity(manifest.generations().len());
        for &generation in manifest.generations() {
            let path = table_path(&dir, generation);
            let reader = SSTableReader::open(&path)
                .with_context(|| format!("failed to open table {}", path.display()))?;
            tables.push(LiveTable {
                generation,
                reader: Arc::new(reader),
            });
        }

        let orphans = files
            .iter()
            .filter(|(file, _)| {
                matches!(file, TableFile::Table(g) if !manifest.generations().contains(g))
            })
            .count();
        if orphans > 0 {
            tracing::warn!(
                dir = %dir.display(),
                orphans,
                "ignoring table files not listed in the manifest"
            );
        }

        let highest = files
            .iter()
            .map(|(file, _)| file.generation())
            .chain(manifest.max_generation())
            .max();
        let next_generation = match highest {
            Some(g) => g
                .checked_add(1)
                .context("generation counter exhausted")?,
            None => 1,
        };

        tracing::info!(
            dir = %dir.display(),
            tables = tables.len(),
            next_generation,
            "engine opened"
        );

        clock.observe(manifest.max_timestamp());
        let mem = Arc::new(Memtable::new(Arc::clone(&clock)));
        Ok(Self {
            config,
            inner: RwLock::new(Inner {
                dir,
                clock,
                mem,
                tables,
                manifest,
                next_generation,
            }),
        })
    }
}

/// Removes `<generation>.tmp` files left behind by a crash mid-write.
fn remove_stale_tmp_files(files: &[(TableFile, PathBuf)]) {
    for (file, path) in files {
        if let TableFile::Temp(_) = file {
            match fs::remove_file(path) {
                Ok(()) => tracing::warn!(path = %path.display(), "removed stale temp table"),
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to remove stale temp table"
                ),
            }
        }
    }
}

/// Builds a manifest from the `.dat` files on disk when none exists yet.
fn bootstrap_manifest(dir: &Path, files: &[(TableFile, PathBuf)]) -> Result<Manifest> {
    let mut manifest = Manifest::empty(dir);
    for (file, path) in files {
        if let TableFile::Table(generation) = file {
            manifest.add(*generation);
            manifest.observe_timestamp(max_timestamp_in(path)?);
        }
    }
    if !manifest.generations().is_empty() {
        manifest.save()?;
        tracing::info!(
            path = %manifest.path().display(),
            tables = manifest.generations().len(),
            "bootstrapped manifest from table files"
        );
    }
    Ok(manifest)
}

/// Highest timestamp stored in one table. Reads every row, so it is only
/// used when there is no manifest to record it.
fn max_timestamp_in(path: &Path) -> Result<u64> {
    let reader = Arc::new(
        SSTableReader::open(path)
            .with_context(|| format!("failed to open table {}", path.display()))?,
    );
    let mut max = 0;
    for cell in reader.scan(b"")? {
        max = max.max(cell?.timestamp());
    }
    Ok(max)
}
