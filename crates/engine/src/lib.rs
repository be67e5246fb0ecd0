//! # Engine - LSM-tree storage engine
//!
//! The orchestrator that ties the [`memtable`] and [`sstable`] crates into a
//! complete key-value store.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌───────────────────────────────────────────────┐
//! │                   ENGINE                      │
//! │                                               │
//! │ write.rs → Memtable insert                    │
//! │              |                                │
//! │              |  (size >= flush_threshold?)    │
//! │              |            yes                 │
//! │              v                                │
//! │           flush() → <generation>.dat          │
//! │              |                                │
//! │              |  (tables > trigger?)           │
//! │              |            yes                 │
//! │              v                                │
//! │           compact() → one merged table        │
//! │                                               │
//! │ read.rs → merge(Memtable, tables newest-first)│
//! │            (newest timestamp wins)            │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module         | Purpose                                                  |
//! |----------------|----------------------------------------------------------|
//! | `lib.rs`       | `Engine` struct, accessors, `Debug`, `Drop`, `close`     |
//! | [`recovery`]   | `open()`, filename grammar, tmp cleanup, generations     |
//! | `write`        | `put()`, `delete()`, `flush()`                           |
//! | `read`         | `scan()` and the [`Scan`] iterator                       |
//! | `compaction`   | `compact()` through the live merge pipeline              |
//! | `manifest`     | Persistent list of live generations (atomic file ops)    |
//!
//! ## Concurrency
//!
//! All state sits behind one `RwLock`. Writers (`put`, `delete`, `flush`,
//! `compact`) hold the write lock for the whole operation. `scan` holds the
//! read lock only while it clones the memtable `Arc` and the table `Arc`s;
//! the returned iterator then runs lock-free on that snapshot. The memtable
//! is changed through `Arc::make_mut`, so a write that races an open scan
//! copies the table instead of touching the one the scan is reading.
//!
//! ## Durability
//!
//! There is no write-ahead log. Writes live only in the memtable until the
//! next flush, and anything not flushed before an unclean shutdown is lost.
//! [`Engine::close`] (or dropping the engine) flushes whatever is pending.
//! Tables and the manifest are installed with temp file, fsync, rename.
mod compaction;
mod manifest;
mod read;
pub mod recovery;
mod write;

use anyhow::Result;
use config::EngineConfig;
use manifest::Manifest;
use memtable::{Clock, Memtable};
use parking_lot::RwLock;
use sstable::{CellIter, SSTableReader, Table};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use manifest::MANIFEST_FILENAME;
pub use read::Scan;
pub use recovery::{parse_table_name, table_path, TableFile};

/// One on-disk table in the live set.
#[derive(Debug, Clone)]
pub(crate) struct LiveTable {
    pub(crate) generation: u64,
    pub(crate) reader: Arc<SSTableReader>,
}

/// Everything the write lock protects.
#[derive(Debug)]
pub(crate) struct Inner {
    pub(crate) dir: PathBuf,
    pub(crate) clock: Arc<Clock>,
    pub(crate) mem: Arc<Memtable>,
    /// Live tables, oldest generation first.
    pub(crate) tables: Vec<LiveTable>,
    pub(crate) manifest: Manifest,
    pub(crate) next_generation: u64,
}

/// Frozen view of the engine state taken by a scan or a compaction.
pub(crate) struct Snapshot {
    mem: Arc<Memtable>,
    /// Newest generation first.
    tables: Vec<Arc<SSTableReader>>,
}

impl Inner {
    pub(crate) fn snapshot(&self) -> Snapshot {
        Snapshot {
            mem: Arc::clone(&self.mem),
            tables: self
                .tables
                .iter()
                .rev()
                .map(|t| Arc::clone(&t.reader))
                .collect(),
        }
    }

    pub(crate) fn fresh_memtable(&self) -> Arc<Memtable> {
        Arc::new(Memtable::new(Arc::clone(&self.clock)))
    }
}

impl Snapshot {
    /// Merge sources in tie-break priority: memtable, then tables newest
    /// generation first.
    pub(crate) fn sources(&self, from: &[u8]) -> sstable::Result<Vec<CellIter>> {
        let mut sources = Vec::with_capacity(self.tables.len() + 1);
        sources.push(self.mem.cells(from)?);
        for table in &self.tables {
            sources.push(table.cells(from)?);
        }
        Ok(sources)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.mem.is_empty() && self.tables.is_empty()
    }
}

/// The storage engine.
///
/// # Write Path
///
/// 1. Stamp the write with the shared [`Clock`] and apply it to the memtable.
/// 2. If `memtable_size() >= flush_threshold`, flush the memtable to
///    `<generation>.dat` and start a fresh one.
/// 3. If the table count now exceeds the compaction trigger, compact
///    everything into a single table.
///
/// # Read Path
///
/// [`scan`](Engine::scan) merges the memtable and every table, keeps the
/// newest version of each key, and drops tombstones.
///
/// # Lifecycle
///
/// [`open`](Engine::open) recovers the live set from disk.
/// [`close`](Engine::close) flushes and consumes the engine, so a closed
/// engine cannot be used again.
pub struct Engine {
    config: EngineConfig,
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Engine")
            .field("dir", &self.config.dir)
            .field("flush_threshold", &self.config.flush_threshold)
            .field("compaction_trigger", &self.config.compaction_trigger)
            .field("memtable_size", &inner.mem.size_in_bytes())
            .field("memtable_entries", &inner.mem.len())
            .field("table_count", &inner.tables.len())
            .field("next_generation", &inner.next_generation)
            .finish()
    }
}

impl Engine {
    /// Flushes any pending memtable content and shuts the engine down.
    ///
    /// # Errors
    ///
    /// Returns an error if the final flush fails. The engine is consumed
    /// either way; on failure the pending writes are lost.
    pub fn close(self) -> Result<()> {
        self.flush()
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Base directory holding the tables and the manifest.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.config.dir
    }

    /// Number of tables in the live set.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.inner.read().tables.len()
    }

    /// Live generations, oldest first.
    #[must_use]
    pub fn generations(&self) -> Vec<u64> {
        self.inner.read().tables.iter().map(|t| t.generation).collect()
    }

    /// Current memtable size in key + value bytes.
    #[must_use]
    pub fn memtable_size(&self) -> usize {
        self.inner.read().mem.size_in_bytes()
    }

    /// Number of keys (tombstones included) buffered in the memtable.
    #[must_use]
    pub fn memtable_len(&self) -> usize {
        self.inner.read().mem.len()
    }

    /// Generation the next flush or compaction will write.
    #[must_use]
    pub fn next_generation(&self) -> u64 {
        self.inner.read().next_generation
    }

    /// The clock stamping this engine's writes.
    #[must_use]
    pub fn clock(&self) -> Arc<Clock> {
        Arc::clone(&self.inner.read().clock)
    }
}

/// Best-effort flush on drop.
///
/// Pending memtable content is written to a table so a caller that forgot
/// [`Engine::close`] does not lose it. Errors cannot propagate out of `Drop`,
/// so a failure is only logged.
impl Drop for Engine {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if inner.mem.is_empty() {
            return;
        }
        if let Err(e) = inner.flush() {
            tracing::warn!("flush on drop failed in {}: {:#}", inner.dir.display(), e);
        }
    }
}

#[cfg(test)]
mod tests;
