//! # SSTable - Sorted String Table
//!
//! Immutable, on-disk storage files for the storage engine.
//!
//! When the in-memory [`memtable::Memtable`] reaches its size threshold the
//! engine flushes it to disk as an SSTable. SSTables are *write-once,
//! read-many*: once created they are never modified, only replaced as a
//! whole during compaction.
//!
//! ## File layout
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ CELL BLOCK (sorted cells, starts at byte 0)                   │
//! │                                                               │
//! │ key_len (i32) | key | timestamp (i64)                         │
//! │ [value_len (i32) | value]       only if timestamp >= 0        │
//! │                                                               │
//! │ ... repeated for each row ...                                 │
//! │                                                               │
//! │ A tombstone stores its timestamp negated and has no value.    │
//! ├───────────────────────────────────────────────────────────────┤
//! │ OFFSET BLOCK                                                  │
//! │                                                               │
//! │ offset (i32) per row, start of that cell in the cell block    │
//! ├───────────────────────────────────────────────────────────────┤
//! │ FOOTER (always last 4 bytes)                                  │
//! │                                                               │
//! │ row_count (i32)                                               │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! All integers are big-endian. The offset block spans the
//! `4 * row_count` bytes before the footer; everything before it is the
//! cell block.
//!
//! ## Reading
//!
//! [`SSTableReader`] keeps only the offsets in memory. Lookups binary-search
//! row keys on disk and scans decode one row per step. The [`merge`]
//! pipeline combines scans of many tables (and the memtable) into a single
//! view where the newest version of each key wins.

pub mod format;
pub mod merge;

mod error;
mod reader;
mod table;
mod writer;

pub use error::{Result, SstableError};
pub use merge::{merge_live, CellStream, Collapse, LiveCells, LiveMerge, MergeIter};
pub use reader::{SSTableIter, SSTableReader};
pub use table::{CellIter, Table};
pub use writer::{tmp_path_for, SSTableWriter};

#[cfg(test)]
mod tests;
