use byteorder::{BigEndian, WriteBytesExt};
use memtable::{Cell, Memtable};
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Result, SstableError};
use crate::format::{write_cell, MAX_OFFSET};

/// Writes a sorted cell sequence to disk as an immutable SSTable file.
///
/// The writer is stateless. The write is crash-safe: data goes to a
/// temporary file next to the target, is fsynced, and is then atomically
/// renamed to the final path. No reader ever observes a partial table.
pub struct SSTableWriter {}

impl SSTableWriter {
    /// Flushes every entry of `mem`, tombstones included, to `path`.
    pub fn write_from_memtable(path: &Path, mem: &Memtable) -> Result<usize> {
        let cells = mem
            .iter()
            .map(|(k, v)| Ok(Cell::new(k.to_vec(), v.clone())));
        Self::write(path, cells)
    }

    /// Writes `cells` to `path` and returns the number of rows written.
    ///
    /// `cells` must be strictly ascending by key (one version per key). The
    /// first error the sequence yields aborts the write.
    ///
    /// # Crash Safety
    ///
    /// Writes to `path` with a `.tmp` extension, calls `sync_all()`, then
    /// renames. On any failure the temp file is removed and `path` is left
    /// untouched. If the process dies mid-write the temp file stays behind
    /// and is cleaned up on the next open.
    ///
    /// # Errors
    ///
    /// [`SstableError::Unsorted`] if keys are not strictly ascending,
    /// [`SstableError::TableTooLarge`] if offsets outgrow `i32`, and any
    /// error produced by `cells` or by I/O.
    pub fn write<I>(path: &Path, cells: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Cell>>,
    {
        let tmp_path = tmp_path_for(path);

        let rows = match Self::write_tmp(&tmp_path, cells) {
            Ok(rows) => rows,
            Err(e) => {
                let _ = fs::remove_file(&tmp_path);
                return Err(e);
            }
        };

        // Atomically move into place
        if let Err(e) = fs::rename(&tmp_path, path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        // Make the rename itself durable where the platform allows it.
        if let Some(parent) = path.parent() {
            if let Ok(dir) = fs::File::open(parent) {
                let _ = dir.sync_all();
            }
        }

        tracing::trace!(path = %path.display(), rows, "sstable written");
        Ok(rows)
    }

    fn write_tmp<I>(tmp_path: &Path, cells: I) -> Result<usize>
    where
        I: IntoIterator<Item = Result<Cell>>,
    {
        let raw_file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(tmp_path)?;
        let mut file = BufWriter::new(raw_file);

        let mut offsets: Vec<u32> = Vec::new();
        let mut position: u64 = 0;
        let mut previous: Option<Vec<u8>> = None;

        // CELL block
        for cell in cells {
            let cell = cell?;
            if let Some(prev) = &previous {
                if cell.key.as_slice() <= prev.as_slice() {
                    return Err(SstableError::Unsorted {
                        previous: prev.clone(),
                        key: cell.key,
                    });
                }
            }

            offsets.push(position as u32);
            position += write_cell(&mut file, &cell)?;
            if position > MAX_OFFSET {
                return Err(SstableError::TableTooLarge(position));
            }
            previous = Some(cell.key);
        }

        let rows = i32::try_from(offsets.len())
            .map_err(|_| SstableError::TableTooLarge(position))?;

        // OFFSET block
        for offset in &offsets {
            file.write_i32::<BigEndian>(*offset as i32)?;
        }

        // FOOTER
        file.write_i32::<BigEndian>(rows)?;

        file.flush()?;
        file.into_inner()
            .map_err(io::IntoInnerError::into_error)?
            .sync_all()?;

        Ok(offsets.len())
    }
}

/// The temporary path a table is staged at before being renamed to `path`.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    path.with_extension("tmp")
}
