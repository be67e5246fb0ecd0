use std::io;
use std::path::PathBuf;

use memtable::{Timestamp, ValueError};
use thiserror::Error;

/// Result alias for table operations.
pub type Result<T> = std::result::Result<T, SstableError>;

/// Errors that can occur while writing, opening, or reading an SSTable.
#[derive(Debug, Error)]
pub enum SstableError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The footer, offsets, or a length field disagrees with the file.
    #[error("corrupt sstable {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// The writer was handed keys that are not strictly ascending.
    #[error("keys out of order: {key:?} after {previous:?}")]
    Unsorted { previous: Vec<u8>, key: Vec<u8> },

    /// The timestamp does not fit the signed on-disk field, or a tombstone
    /// carries timestamp 0 and could not be told apart from live data.
    #[error("timestamp {0} cannot be encoded")]
    TimestampOutOfRange(Timestamp),

    /// The cell block outgrew the int32 offset range.
    #[error("cell block of {0} bytes exceeds the int32 offset range")]
    TableTooLarge(u64),

    /// A row index past the end of the table.
    #[error("row {row} out of range for table with {rows} rows")]
    RowOutOfRange { row: usize, rows: usize },

    /// A contract violation on a value (e.g. reading data off a tombstone).
    #[error(transparent)]
    Value(#[from] ValueError),
}

impl SstableError {
    /// `true` for misuse by the caller, as opposed to disk or data problems.
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            SstableError::Unsorted { .. }
                | SstableError::TimestampOutOfRange(_)
                | SstableError::RowOutOfRange { .. }
                | SstableError::Value(_)
        )
    }

    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(self, SstableError::Corrupt { .. })
    }
}
