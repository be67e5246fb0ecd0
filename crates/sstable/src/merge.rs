//! The read pipeline: k-way merge, same-key collapse, tombstone filter.
//!
//! Each stage is an ordinary iterator adapter over `Result<Cell>` and can be
//! used (and tested) on its own:
//!
//! 1. [`MergeIter`] interleaves any number of ascending sources into one
//!    stream ordered by key ascending, then timestamp descending.
//! 2. [`Collapse`] keeps only the first cell of every run of equal keys.
//!    Under the merge order that is the newest version, whichever source
//!    it came from.
//! 3. [`LiveCells`] drops tombstones.
//!
//! [`merge_live`] chains all three. Errors from any source pass straight
//! through every stage; the merge stops after the first one.

use memtable::Cell;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::error::Result;
use crate::table::CellIter;

/// The current head of one source, ordered for a max-heap so that the
/// smallest key, then the newest timestamp, then the lowest source index
/// comes out first.
struct HeapEntry {
    cell: Cell,
    /// Index into `MergeIter::sources`.
    source: usize,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: reverse the key, keep the timestamp
        // (newest is "largest"), reverse the source index.
        other
            .cell
            .key
            .cmp(&self.cell.key)
            .then_with(|| self.cell.timestamp().cmp(&other.cell.timestamp()))
            .then_with(|| other.source.cmp(&self.source))
    }
}

/// K-way merge of ascending cell sources.
///
/// Every version of every key is emitted; nothing is deduplicated here.
/// On equal key and timestamp, the source listed first wins the tie.
pub struct MergeIter {
    sources: Vec<CellIter>,
    heap: BinaryHeap<HeapEntry>,
    failed: bool,
}

impl MergeIter {
    /// Primes the heap with the first cell of every source.
    ///
    /// # Errors
    ///
    /// The first error any source yields while priming.
    pub fn new(sources: Vec<CellIter>) -> Result<Self> {
        let mut sources = sources;
        let mut heap = BinaryHeap::with_capacity(sources.len());
        for (source, iter) in sources.iter_mut().enumerate() {
            if let Some(cell) = iter.next() {
                heap.push(HeapEntry { cell: cell?, source });
            }
        }
        Ok(Self {
            sources,
            heap,
            failed: false,
        })
    }
}

impl Iterator for MergeIter {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let top = self.heap.pop()?;

        // Advance the source we just consumed from.
        match self.sources[top.source].next() {
            Some(Ok(cell)) => self.heap.push(HeapEntry {
                cell,
                source: top.source,
            }),
            Some(Err(e)) => {
                self.failed = true;
                return Some(Err(e));
            }
            None => {}
        }

        Some(Ok(top.cell))
    }
}

/// Keeps the first cell of every run of equal keys.
pub struct Collapse<I> {
    inner: I,
    last_key: Option<Vec<u8>>,
}

impl<I> Iterator for Collapse<I>
where
    I: Iterator<Item = Result<Cell>>,
{
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let cell = match self.inner.next()? {
                Ok(cell) => cell,
                Err(e) => return Some(Err(e)),
            };
            if self.last_key.as_deref() == Some(cell.key.as_slice()) {
                continue;
            }
            self.last_key = Some(cell.key.clone());
            return Some(Ok(cell));
        }
    }
}

/// Drops tombstones.
pub struct LiveCells<I> {
    inner: I,
}

impl<I> Iterator for LiveCells<I>
where
    I: Iterator<Item = Result<Cell>>,
{
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.inner.next()? {
                Ok(cell) if cell.is_tombstone() => continue,
                other => return Some(other),
            }
        }
    }
}

/// Adapter methods for chaining the pipeline stages.
pub trait CellStream: Iterator<Item = Result<Cell>> + Sized {
    /// See [`Collapse`].
    fn collapse_versions(self) -> Collapse<Self> {
        Collapse {
            inner: self,
            last_key: None,
        }
    }

    /// See [`LiveCells`].
    fn live(self) -> LiveCells<Self> {
        LiveCells { inner: self }
    }
}

impl<I> CellStream for I where I: Iterator<Item = Result<Cell>> {}

/// The full read pipeline over `sources`: merged, one version per key
/// (the newest), tombstones removed.
pub type LiveMerge = LiveCells<Collapse<MergeIter>>;

/// Builds the full pipeline. Sources are listed in tie-break priority.
pub fn merge_live(sources: Vec<CellIter>) -> Result<LiveMerge> {
    Ok(MergeIter::new(sources)?.collapse_versions().live())
}
