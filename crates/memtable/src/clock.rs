//! Logical timestamps for versioning writes.

use parking_lot::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque, totally ordered write timestamp.
pub type Timestamp = u64;

/// Ticks available inside a single wall-clock millisecond.
pub const TICKS_PER_MILLI: u64 = 1_000_000;

#[derive(Debug, Default)]
struct ClockState {
    last_millis: u64,
    counter: u64,
    last_issued: Timestamp,
}

/// Produces strictly increasing timestamps.
///
/// Each stamp is `millis * TICKS_PER_MILLI + counter`, where the counter
/// restarts whenever the observed millisecond changes. The result is also
/// clamped to at least one past the previous stamp, so the sequence stays
/// strictly increasing if the wall clock steps backwards or a single
/// millisecond sees more than [`TICKS_PER_MILLI`] calls. The first stamp is
/// never `0`.
///
/// A `Clock` is an ordinary value; share it with `Arc` between the tables
/// that stamp writes. Calls from several threads are serialized internally.
#[derive(Debug)]
pub struct Clock {
    source: fn() -> u64,
    state: Mutex<ClockState>,
}

impl Clock {
    /// A clock driven by the system wall clock (milliseconds since the epoch).
    pub fn new() -> Self {
        Self::with_source(system_millis)
    }

    /// A clock driven by a caller-supplied millisecond source.
    pub fn with_source(source: fn() -> u64) -> Self {
        Self {
            source,
            state: Mutex::new(ClockState::default()),
        }
    }

    /// Returns the next timestamp.
    pub fn next(&self) -> Timestamp {
        let now = (self.source)();
        let mut state = self.state.lock();

        if now != state.last_millis {
            state.last_millis = now;
            state.counter = 0;
        } else {
            state.counter += 1;
        }

        let candidate = now
            .saturating_mul(TICKS_PER_MILLI)
            .saturating_add(state.counter);
        let stamp = candidate.max(state.last_issued.saturating_add(1));
        state.last_issued = stamp;
        stamp
    }

    /// The most recently issued timestamp, or `0` if none was issued yet.
    pub fn last(&self) -> Timestamp {
        self.state.lock().last_issued
    }

    /// Makes every later stamp greater than `timestamp`.
    ///
    /// Used on restart so that new writes outrank data already on disk even
    /// if the wall clock has not moved past it.
    pub fn observe(&self, timestamp: Timestamp) {
        let mut state = self.state.lock();
        state.last_issued = state.last_issued.max(timestamp);
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

fn system_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
