//! SSTable binary format: cell encoding, offset block, and footer.
//!
//! All integers are big-endian and fixed width.
//!
//! ```text
//! Cell   := key_len (i32) | key | timestamp (i64) | [value_len (i32) | value]
//! Offset := i32 per row, start of the row's cell within the cell block
//! Footer := row_count (i32), always the last 4 bytes
//! ```
//!
//! A tombstone stores its timestamp negated and has no value fields. Live
//! timestamps are never negative, so the sign alone tells the two apart.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use memtable::{Cell, Value};
use std::io::Write;

use crate::error::{Result, SstableError};

/// Size of the row-count footer: a single `i32`.
pub const FOOTER_BYTES: u64 = 4;

/// Size of one offset-block entry: a single `i32`.
pub const OFFSET_BYTES: u64 = 4;

/// `key_len` and `value_len` prefixes.
pub const LEN_BYTES: usize = 4;

/// The signed timestamp field.
pub const TIMESTAMP_BYTES: usize = 8;

/// Largest byte position an `i32` offset can address.
pub const MAX_OFFSET: u64 = i32::MAX as u64;

/// Byte spans of an SSTable derived from its length and footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Number of rows recorded in the footer.
    pub rows: usize,
    /// Length of the cell block, which starts at byte 0.
    pub cell_block_len: u64,
    /// Where the offset block starts (equal to `cell_block_len`).
    pub offset_block_start: u64,
}

impl Layout {
    /// Derives the layout of a file of `file_len` bytes whose footer reads
    /// `row_count`.
    ///
    /// Returns a human-readable reason if the footer cannot be right for a
    /// file of that size.
    pub fn derive(file_len: u64, row_count: i32) -> std::result::Result<Self, String> {
        if row_count < 0 {
            return Err(format!("negative row count {}", row_count));
        }
        let rows = row_count as u64;
        let tail = FOOTER_BYTES + OFFSET_BYTES * rows;
        let offset_block_start = file_len.checked_sub(tail).ok_or_else(|| {
            format!(
                "row count {} needs {} trailing bytes but file has {}",
                rows, tail, file_len
            )
        })?;
        if offset_block_start > MAX_OFFSET {
            return Err(format!(
                "cell block of {} bytes exceeds the int32 offset range",
                offset_block_start
            ));
        }
        if rows == 0 && offset_block_start != 0 {
            return Err(format!(
                "empty table carries {} stray cell bytes",
                offset_block_start
            ));
        }
        Ok(Self {
            rows: rows as usize,
            cell_block_len: offset_block_start,
            offset_block_start,
        })
    }
}

/// Encodes the signed on-disk timestamp for `value`.
pub fn encode_timestamp(value: &Value) -> Result<i64> {
    let ts = value.timestamp();
    if ts > i64::MAX as u64 {
        return Err(SstableError::TimestampOutOfRange(ts));
    }
    match value {
        Value::Data { .. } => Ok(ts as i64),
        Value::Tombstone { .. } if ts == 0 => Err(SstableError::TimestampOutOfRange(ts)),
        Value::Tombstone { .. } => Ok(-(ts as i64)),
    }
}

/// Writes one cell to `w` and returns the number of bytes written.
pub fn write_cell<W: Write>(w: &mut W, cell: &Cell) -> Result<u64> {
    let timestamp = encode_timestamp(&cell.value)?;
    let key_len = len_field(cell.key.len())?;

    w.write_i32::<BigEndian>(key_len)?;
    w.write_all(&cell.key)?;
    w.write_i64::<BigEndian>(timestamp)?;
    let mut written = LEN_BYTES + cell.key.len() + TIMESTAMP_BYTES;

    if let Value::Data { bytes, .. } = &cell.value {
        w.write_i32::<BigEndian>(len_field(bytes.len())?)?;
        w.write_all(bytes)?;
        written += LEN_BYTES + bytes.len();
    }

    Ok(written as u64)
}

fn len_field(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| SstableError::TableTooLarge(len as u64))
}

/// Decodes a full cell that must occupy `row` exactly.
pub fn decode_cell(row: &[u8]) -> std::result::Result<Cell, String> {
    let mut cursor = row;

    let key_len = read_len(&mut cursor, "key")?;
    let key = take(&mut cursor, key_len, "key")?.to_vec();

    let timestamp = cursor
        .read_i64::<BigEndian>()
        .map_err(|_| "row truncated inside timestamp".to_string())?;

    let value = if timestamp < 0 {
        Value::Tombstone {
            timestamp: timestamp.unsigned_abs(),
        }
    } else {
        let value_len = read_len(&mut cursor, "value")?;
        let bytes = take(&mut cursor, value_len, "value")?.to_vec();
        Value::Data {
            timestamp: timestamp as u64,
            bytes,
        }
    };

    if !cursor.is_empty() {
        return Err(format!("{} trailing bytes after cell", cursor.len()));
    }
    Ok(Cell::new(key, value))
}

fn read_len(cursor: &mut &[u8], what: &str) -> std::result::Result<usize, String> {
    let len = cursor
        .read_i32::<BigEndian>()
        .map_err(|_| format!("row truncated inside {} length", what))?;
    usize::try_from(len).map_err(|_| format!("negative {} length {}", what, len))
}

fn take<'a>(cursor: &mut &'a [u8], len: usize, what: &str) -> std::result::Result<&'a [u8], String> {
    if cursor.len() < len {
        return Err(format!(
            "{} length {} overruns row ({} bytes left)",
            what,
            len,
            cursor.len()
        ));
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}
