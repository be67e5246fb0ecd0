//! Read path: `scan()`.
//!
//! A scan merges the memtable with every live table through the
//! [`sstable::merge`] pipeline. Sources are ordered memtable first, then
//! tables newest generation first; that order only matters for the
//! tie-break between identical timestamps.
use anyhow::{Context, Result};
use sstable::{merge_live, LiveMerge};

use crate::Engine;

/// Lazy ascending `(key, value)` pairs of live data.
///
/// The iterator owns a snapshot of the engine taken when
/// [`Engine::scan`] was called, so later writes, flushes, and compactions
/// never show up in it. It is single-pass and stops after the first error.
pub struct Scan {
    merged: LiveMerge,
    failed: bool,
}

impl Iterator for Scan {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let item = self
            .merged
            .next()?
            .map_err(anyhow::Error::from)
            .and_then(|cell| cell.into_pair().map_err(anyhow::Error::from));
        if item.is_err() {
            self.failed = true;
        }
        Some(item.context("scan failed"))
    }
}

impl std::iter::FusedIterator for Scan {}

impl Engine {
    /// Every live key `>= from` in ascending order, with its newest value.
    ///
    /// Pass `b""` to scan from the lowest key.
    ///
    /// # Errors
    ///
    /// Returns an error if a table cannot be positioned at `from`. Errors
    /// while iterating are yielded as items.
    pub fn scan(&self, from: &[u8]) -> Result<Scan> {
        let snapshot = self.inner.read().snapshot();
        let sources = snapshot
            .sources(from)
            .context("failed to position scan sources")?;
        let merged = merge_live(sources).context("failed to start scan")?;
        Ok(Scan {
            merged,
            failed: false,
        })
    }

    /// Collects [`scan`](Engine::scan) into a vector.
    pub fn scan_all(&self, from: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.scan(from)?.collect()
    }
}
