//! Compaction: merges the memtable and every table into a single table.
//!
//! The output is the live merge pipeline itself, so superseded versions and
//! tombstones are dropped on the way through. The swap to the new table is a
//! single manifest save; old files are deleted only afterwards.
use anyhow::{Context, Result};
use sstable::{merge_live, SSTableReader, SSTableWriter};
use std::sync::Arc;

use crate::recovery::table_path;
use crate::{Engine, Inner, LiveTable};

impl Engine {
    /// Compacts the whole engine state into one table.
    ///
    /// Runs automatically after a flush once the table count exceeds the
    /// configured trigger, or whenever the caller invokes it. Running it
    /// twice in a row changes nothing a scan can observe.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure while merging, writing the new table,
    /// or saving the manifest. The previous state stays live in that case.
    /// Failing to delete a superseded file is only logged.
    pub fn compact(&self) -> Result<()> {
        self.inner.write().compact()
    }
}

impl Inner {
    /// # Steps
    ///
    /// 1. Run the live merge over memtable + all tables from the lowest key.
    /// 2. Stream it into `<next_generation>.dat` (may be empty).
    /// 3. Save a manifest that names only the new generation.
    /// 4. Swap the live set, reset the memtable.
    /// 5. Delete the superseded files; failures leave orphans that are no
    ///    longer part of the live set.
    pub(crate) fn compact(&mut self) -> Result<()> {
        let snapshot = self.snapshot();
        if snapshot.is_empty() {
            return Ok(());
        }

        let sources = snapshot
            .sources(b"")
            .context("failed to position compaction sources")?;
        let merged = merge_live(sources).context("failed to start compaction merge")?;

        let generation = self.next_generation;
        let path = table_path(&self.dir, generation);
        let rows = SSTableWriter::write(&path, merged)
            .with_context(|| format!("failed to write compacted table {}", path.display()))?;
        self.next_generation += 1;
        drop(snapshot);

        let reader = SSTableReader::open(&path)
            .with_context(|| format!("failed to open compacted table {}", path.display()))?;

        let mut manifest = self.manifest.clone();
        manifest.replace_all(generation);
        manifest.observe_timestamp(self.clock.last());
        manifest.save()?;
        self.manifest = manifest;

        let superseded = std::mem::replace(
            &mut self.tables,
            vec![LiveTable {
                generation,
                reader: Arc::new(reader),
            }],
        );
        self.mem = self.fresh_memtable();

        let merged_tables = superseded.len();
        for table in superseded {
            let old = table.reader.path().to_path_buf();
            drop(table);
            if let Err(e) = std::fs::remove_file(&old) {
                tracing::warn!(
                    path = %old.display(),
                    error = %e,
                    "failed to delete superseded table; leaving orphan"
                );
            }
        }

        tracing::info!(
            generation,
            rows,
            merged_tables,
            "compaction finished"
        );
        Ok(())
    }
}
