//! # Memtable - sorted in-memory write buffer
//!
//! Every write lands here first. The memtable maps each key to its latest
//! [`Value`] (live data or a tombstone) and keeps a running byte count that
//! the engine compares against its flush threshold.
//!
//! Values are stamped by a shared [`Clock`], so ordering across the memtable
//! and every on-disk table is decided by timestamp alone.
//!
//! ## Snapshots
//!
//! [`Memtable::scan`] takes `self: &Arc<Self>` and the returned
//! [`MemtableIter`] keeps that `Arc` alive. The engine mutates its memtable
//! through `Arc::make_mut`, which clones the table only while a scan still
//! holds the old version, so an in-flight scan never observes later writes.

mod clock;
mod value;

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

pub use clock::{Clock, Timestamp, TICKS_PER_MILLI};
pub use value::{Cell, Value, ValueError};

#[derive(Debug, Clone)]
pub struct Memtable {
    map: BTreeMap<Vec<u8>, Value>,
    size_in_bytes: usize,
    clock: Arc<Clock>,
}

impl Memtable {
    pub fn new(clock: Arc<Clock>) -> Self {
        Self {
            map: BTreeMap::new(),
            size_in_bytes: 0,
            clock,
        }
    }

    /// Stores `value` under `key` with a fresh timestamp, replacing any
    /// previous version.
    ///
    /// Size accounting: a new key adds key + value bytes, replacing live data
    /// adds the value-length delta, replacing a tombstone adds the full value.
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        let added = value.len();
        let key_len = key.len();
        let previous = self.map.insert(key, Value::live(value, &self.clock));

        self.size_in_bytes = match previous {
            None => self.size_in_bytes + key_len + added,
            Some(Value::Tombstone { .. }) => self.size_in_bytes + added,
            Some(Value::Data { bytes, .. }) => self.size_in_bytes + added - bytes.len(),
        };
    }

    /// Replaces the mapping for `key` with a tombstone.
    ///
    /// Deleting live data subtracts its value length. A key seen for the
    /// first time still counts its key bytes.
    pub fn delete(&mut self, key: Vec<u8>) {
        let key_len = key.len();
        let previous = self.map.insert(key, Value::tombstone(&self.clock));

        self.size_in_bytes = match previous {
            None => self.size_in_bytes + key_len,
            Some(Value::Tombstone { .. }) => self.size_in_bytes,
            Some(Value::Data { bytes, .. }) => self.size_in_bytes - bytes.len(),
        };
    }

    /// The latest live value for `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).and_then(|v| v.data().ok())
    }

    /// The stored version for `key`, tombstones included.
    pub fn get_entry(&self, key: &[u8]) -> Option<&Value> {
        self.map.get(key)
    }

    /// Ascending cells starting at the first key `>= from`.
    ///
    /// The iterator owns a clone of the `Arc`, so it reads the table as it was
    /// when the scan began for as long as writers go through `Arc::make_mut`.
    pub fn scan(self: &Arc<Self>, from: &[u8]) -> MemtableIter {
        MemtableIter {
            table: Arc::clone(self),
            lower: Bound::Included(from.to_vec()),
        }
    }

    /// Ordered iterator over entries (key, Value)
    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &Value)> {
        self.map.iter().map(|(k, v)| (k.as_slice(), v))
    }

    /// Running estimate of live key + value bytes.
    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.size_in_bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clock(&self) -> &Arc<Clock> {
        &self.clock
    }
}

/// Lazy ascending walk over a memtable snapshot.
///
/// Each step re-seeks the map just past the last key returned, so no range
/// borrow outlives a call to `next`.
#[derive(Debug)]
pub struct MemtableIter {
    table: Arc<Memtable>,
    lower: Bound<Vec<u8>>,
}

impl Iterator for MemtableIter {
    type Item = Cell;

    fn next(&mut self) -> Option<Cell> {
        let lower = match &self.lower {
            Bound::Included(k) => Bound::Included(k.as_slice()),
            Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let (key, value) = self
            .table
            .map
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()?;

        let cell = Cell::new(key.clone(), value.clone());
        self.lower = Bound::Excluded(key.clone());
        Some(cell)
    }
}

impl std::iter::FusedIterator for MemtableIter {}
