//! Write path: `put()`, `delete()`, and `flush()`.
//!
//! Every mutation is applied to the memtable under the write lock. When the
//! memtable reaches the flush threshold it is persisted as a new table before
//! the call returns, and a compaction follows if the table count has grown
//! past the trigger.
use anyhow::{Context, Result};
use sstable::{SSTableReader, SSTableWriter};
use std::sync::Arc;

use crate::recovery::table_path;
use crate::{Engine, Inner, LiveTable};

impl Engine {
    /// Stores `value` under `key`, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error if a triggered flush or compaction fails. The write
    /// itself is already in the memtable at that point.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        let mut inner = self.inner.write();
        Arc::make_mut(&mut inner.mem).put(key, value);
        self.maybe_flush(&mut inner)
    }

    /// Deletes `key` by writing a tombstone that shadows every older version.
    ///
    /// # Errors
    ///
    /// Same as [`put`](Engine::put).
    pub fn delete(&self, key: Vec<u8>) -> Result<()> {
        let mut inner = self.inner.write();
        Arc::make_mut(&mut inner.mem).delete(key);
        self.maybe_flush(&mut inner)
    }

    /// Persists the memtable as a new table regardless of its size.
    ///
    /// No-op if the memtable is empty. Does not trigger compaction.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure while writing the table or the
    /// manifest; the memtable is kept in that case.
    pub fn flush(&self) -> Result<()> {
        self.inner.write().flush()
    }

    fn maybe_flush(&self, inner: &mut Inner) -> Result<()> {
        if inner.mem.size_in_bytes() < self.config.flush_threshold {
            return Ok(());
        }
        inner.flush()?;
        if self.config.should_compact(inner.tables.len()) {
            inner.compact()?;
        }
        Ok(())
    }
}

impl Inner {
    /// # Steps
    ///
    /// 1. Write the full memtable scan to `<next_generation>.dat` (temp file,
    ///    fsync, rename).
    /// 2. Add the generation to the manifest and save it atomically.
    /// 3. Open the new table and append it to the live set.
    /// 4. Replace the memtable with an empty one.
    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.mem.is_empty() {
            return Ok(());
        }

        let generation = self.next_generation;
        let path = table_path(&self.dir, generation);

        let rows = SSTableWriter::write_from_memtable(&path, &self.mem)
            .with_context(|| format!("failed to flush memtable to {}", path.display()))?;
        self.next_generation += 1;

        let reader = SSTableReader::open(&path)
            .with_context(|| format!("failed to open flushed table {}", path.display()))?;

        let mut manifest = self.manifest.clone();
        manifest.add(generation);
        manifest.observe_timestamp(self.clock.last());
        manifest.save()?;
        self.manifest = manifest;

        self.tables.push(LiveTable {
            generation,
            reader: Arc::new(reader),
        });
        self.mem = self.fresh_memtable();

        tracing::debug!(generation, rows, path = %path.display(), "memtable flushed");
        Ok(())
    }
}
