
use memtable::{Cell, Value};

/// A live cell with an explicit timestamp.
pub(crate) fn live(key: &[u8], value: &[u8], timestamp: u64) -> Cell {
    Cell::new(
        key.to_vec(),
        Value::Data {
            timestamp,
            bytes: value.to_vec(),
        },
    )
}

/// A tombstone cell with an explicit timestamp.
pub(crate) fn dead(key: &[u8], timestamp: u64) -> Cell {
    Cell::new(key.to_vec(), Value::Tombstone { timestamp })
}
