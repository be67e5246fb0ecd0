//! Versioned values and the cells that carry them through merges.

use std::cmp::Ordering;

use thiserror::Error;

use crate::clock::{Clock, Timestamp};

/// Contract violations on [`Value`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Data was requested from a deletion marker.
    #[error("tombstone written at {timestamp} has no data")]
    TombstoneData { timestamp: Timestamp },
}

/// A versioned payload: live data or a deletion marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Data { timestamp: Timestamp, bytes: Vec<u8> },
    Tombstone { timestamp: Timestamp },
}

impl Value {
    /// Live data stamped with a fresh timestamp from `clock`.
    pub fn live(bytes: Vec<u8>, clock: &Clock) -> Self {
        Value::Data {
            timestamp: clock.next(),
            bytes,
        }
    }

    /// A deletion marker stamped with a fresh timestamp from `clock`.
    pub fn tombstone(clock: &Clock) -> Self {
        Value::Tombstone {
            timestamp: clock.next(),
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        match self {
            Value::Data { timestamp, .. } | Value::Tombstone { timestamp } => *timestamp,
        }
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, Value::Tombstone { .. })
    }

    /// The payload of a live value.
    ///
    /// # Errors
    ///
    /// [`ValueError::TombstoneData`] if this is a tombstone.
    pub fn data(&self) -> Result<&[u8], ValueError> {
        match self {
            Value::Data { bytes, .. } => Ok(bytes),
            Value::Tombstone { timestamp } => Err(ValueError::TombstoneData {
                timestamp: *timestamp,
            }),
        }
    }

    /// Consuming form of [`data`](Value::data).
    pub fn into_data(self) -> Result<Vec<u8>, ValueError> {
        match self {
            Value::Data { bytes, .. } => Ok(bytes),
            Value::Tombstone { timestamp } => Err(ValueError::TombstoneData { timestamp }),
        }
    }

    /// Payload length in bytes; `0` for tombstones.
    #[must_use]
    pub fn data_len(&self) -> usize {
        match self {
            Value::Data { bytes, .. } => bytes.len(),
            Value::Tombstone { .. } => 0,
        }
    }
}

/// Newest first. Equal timestamps fall back to the payload so the order
/// stays consistent with `Eq`.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .timestamp()
            .cmp(&self.timestamp())
            .then_with(|| match (self, other) {
                (Value::Tombstone { .. }, Value::Tombstone { .. }) => Ordering::Equal,
                (Value::Tombstone { .. }, Value::Data { .. }) => Ordering::Less,
                (Value::Data { .. }, Value::Tombstone { .. }) => Ordering::Greater,
                (Value::Data { bytes: a, .. }, Value::Data { bytes: b, .. }) => a.cmp(b),
            })
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A `(key, Value)` pair.
///
/// Cells order by key ascending, then by timestamp descending. Merging
/// several sorted sources under this order groups every version of a key
/// together with the newest one first.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    pub key: Vec<u8>,
    pub value: Value,
}

impl Cell {
    pub fn new(key: Vec<u8>, value: Value) -> Self {
        Self { key, value }
    }

    #[must_use]
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.value.timestamp()
    }

    #[must_use]
    pub fn is_tombstone(&self) -> bool {
        self.value.is_tombstone()
    }

    /// Splits a live cell into `(key, data)`.
    pub fn into_pair(self) -> Result<(Vec<u8>, Vec<u8>), ValueError> {
        let data = self.value.into_data()?;
        Ok((self.key, data))
    }
}
