//! The one capability shared by the memtable and on-disk tables: an
//! ascending scan from a key. Mutation is only ever available on
//! [`Memtable`] itself; an [`SSTableReader`] exposes none.

use memtable::{Cell, Memtable};
use std::sync::Arc;

use crate::error::Result;
use crate::SSTableReader;

/// A boxed, ascending, fallible stream of cells.
pub type CellIter = Box<dyn Iterator<Item = Result<Cell>> + Send>;

/// A sorted source of cells that can be scanned from any key.
pub trait Table {
    /// Cells with key `>= from` in ascending key order, one version per key.
    fn cells(&self, from: &[u8]) -> Result<CellIter>;
}

impl Table for Arc<Memtable> {
    fn cells(&self, from: &[u8]) -> Result<CellIter> {
        Ok(Box::new(self.scan(from).map(Ok)))
    }
}

impl Table for Arc<SSTableReader> {
    fn cells(&self, from: &[u8]) -> Result<CellIter> {
        Ok(Box::new(self.scan(from)?))
    }
}
