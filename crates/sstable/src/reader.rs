use byteorder::{BigEndian, ReadBytesExt};
use memtable::Cell;
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, SstableError};
use crate::format::{decode_cell, Layout, FOOTER_BYTES, LEN_BYTES};

/// Read-only view of one SSTable file.
///
/// On [`open`](SSTableReader::open) the footer is read and the offset block
/// is loaded and validated: offsets must start at 0, be strictly ascending,
/// and stay inside the cell block. Cells themselves are decoded on demand,
/// one row per read, and every decode is bounds-checked against the row's
/// span, so a damaged file produces [`SstableError::Corrupt`] instead of an
/// out-of-bounds read.
///
/// The file handle sits behind a `Mutex`, so a reader can be shared through
/// an `Arc` by any number of concurrent scans. There are no mutation methods:
/// a table never changes after it is written.
pub struct SSTableReader {
    path: PathBuf,
    /// Start of every row within the cell block.
    offsets: Vec<u32>,
    /// Length of the cell block; the end of the last row.
    cell_block_len: u64,
    file: Mutex<BufReader<File>>,
}

impl std::fmt::Debug for SSTableReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SSTableReader")
            .field("path", &self.path)
            .field("rows", &self.offsets.len())
            .field("cell_block_len", &self.cell_block_len)
            .finish()
    }
}

impl SSTableReader {
    /// Opens an SSTable and loads its offset block into memory.
    ///
    /// # Errors
    ///
    /// [`SstableError::Corrupt`] if the file is shorter than the footer, the
    /// row count does not fit the file, or the offsets are inconsistent;
    /// [`SstableError::Io`] on any I/O failure.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut f = File::open(&path)?;
        let file_len = f.metadata()?.len();

        if file_len < FOOTER_BYTES {
            return Err(corrupt(&path, format!("file of {} bytes has no footer", file_len)));
        }

        f.seek(SeekFrom::End(-(FOOTER_BYTES as i64)))?;
        let row_count = f.read_i32::<BigEndian>()?;
        let layout = Layout::derive(file_len, row_count).map_err(|r| corrupt(&path, r))?;

        f.seek(SeekFrom::Start(layout.offset_block_start))?;
        let mut raw = vec![0u8; layout.rows * 4];
        f.read_exact(&mut raw)?;

        let mut offsets = Vec::with_capacity(layout.rows);
        let mut cursor = raw.as_slice();
        for row in 0..layout.rows {
            let offset = cursor.read_i32::<BigEndian>()?;
            let valid = match offsets.last() {
                None => offset == 0,
                Some(&prev) => offset > prev as i32,
            };
            if !valid || offset < 0 || offset as u64 >= layout.cell_block_len {
                return Err(corrupt(
                    &path,
                    format!("offset {} of row {} is out of place", offset, row),
                ));
            }
            offsets.push(offset as u32);
        }

        f.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path,
            offsets,
            cell_block_len: layout.cell_block_len,
            file: Mutex::new(BufReader::new(f)),
        })
    }

    /// Number of rows in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes only the key of row `i`.
    pub fn key_at(&self, i: usize) -> Result<Vec<u8>> {
        let (start, end) = self.span(i)?;
        let span_len = (end - start) as usize;
        if span_len < LEN_BYTES {
            return Err(corrupt(
                &self.path,
                format!("row {} is only {} bytes", i, span_len),
            ));
        }

        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(start))?;
        let key_len = f.read_i32::<BigEndian>()?;
        let key_len = usize::try_from(key_len)
            .ok()
            .filter(|len| LEN_BYTES + len <= span_len)
            .ok_or_else(|| {
                corrupt(
                    &self.path,
                    format!("key length {} overruns row {} ({} bytes)", key_len, i, span_len),
                )
            })?;
        let mut key = vec![0u8; key_len];
        f.read_exact(&mut key)?;
        Ok(key)
    }

    /// Decodes the full cell at row `i`.
    pub fn cell_at(&self, i: usize) -> Result<Cell> {
        let row = self.read_row(i)?;
        decode_cell(&row).map_err(|r| corrupt(&self.path, format!("row {}: {}", i, r)))
    }

    /// Index of the first row whose key is `>= from`, or [`len`](Self::len)
    /// if every key is smaller. Binary search over [`key_at`](Self::key_at).
    pub fn position(&self, from: &[u8]) -> Result<usize> {
        let mut lo = 0;
        let mut hi = self.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.key_at(mid)?.as_slice() < from {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        Ok(lo)
    }

    /// Lazy ascending cells starting at the first key `>= from`.
    pub fn scan(self: &Arc<Self>, from: &[u8]) -> Result<SSTableIter> {
        let next = self.position(from)?;
        Ok(SSTableIter {
            table: Arc::clone(self),
            next,
            failed: false,
        })
    }

    fn read_row(&self, i: usize) -> Result<Vec<u8>> {
        let (start, end) = self.span(i)?;
        let mut row = vec![0u8; (end - start) as usize];
        let mut f = self.file.lock();
        f.seek(SeekFrom::Start(start))?;
        f.read_exact(&mut row)?;
        Ok(row)
    }

    fn span(&self, i: usize) -> Result<(u64, u64)> {
        let start = *self.offsets.get(i).ok_or(SstableError::RowOutOfRange {
            row: i,
            rows: self.len(),
        })? as u64;
        let end = self
            .offsets
            .get(i + 1)
            .map(|&o| o as u64)
            .unwrap_or(self.cell_block_len);
        Ok((start, end))
    }
}

fn corrupt(path: &Path, reason: impl Into<String>) -> SstableError {
    SstableError::Corrupt {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Ascending cursor over an [`SSTableReader`], one decoded row per step.
///
/// Holds its own `Arc` to the table, so it stays valid even after the
/// engine has dropped the table from its live set. After the first error
/// the iterator is exhausted.
#[derive(Debug)]
pub struct SSTableIter {
    table: Arc<SSTableReader>,
    next: usize,
    failed: bool,
}

impl Iterator for SSTableIter {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.next >= self.table.len() {
            return None;
        }
        let row = self.next;
        self.next += 1;
        let cell = self.table.cell_at(row);
        if cell.is_err() {
            self.failed = true;
        }
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            return (0, Some(0));
        }
        let left = self.table.len().saturating_sub(self.next);
        (0, Some(left))
    }
}

impl std::iter::FusedIterator for SSTableIter {}
