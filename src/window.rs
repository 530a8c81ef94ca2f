//! Rolling time window over received readings.
//!
//! The handheld side keeps the last minute of readings for the chart. The
//! window is append-only from the listener; eviction of expired readings
//! happens inside `append`, atomically with the insertion, so readers never
//! observe a sequence that both contains stale entries and the new one.

use crate::wire::Reading;
use chrono::Utc;
use std::time::Duration;

/// Default retention horizon: readings older than this are evicted.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(60);

/// Bounded time-series buffer of readings in arrival order.
///
/// Invariant after every `append`: each element satisfies
/// `timestamp_millis >= now - horizon`. The sequence is non-decreasing by
/// timestamp as long as the channel delivers in order; out-of-order
/// arrivals are kept where they land rather than re-sorted.
#[derive(Debug)]
pub struct RollingWindow {
    horizon_millis: i64,
    readings: Vec<Reading>,
}

impl RollingWindow {
    /// Create an empty window with the given retention horizon.
    pub fn new(horizon: Duration) -> Self {
        Self {
            horizon_millis: horizon.as_millis() as i64,
            readings: Vec::new(),
        }
    }

    /// Append a reading and evict everything that has fallen out of the
    /// retention horizon. Returns the number of evicted readings.
    pub fn append(&mut self, reading: Reading) -> usize {
        self.append_at(reading, Utc::now().timestamp_millis())
    }

    /// Clock-injected variant of [`append`](Self::append); `now_millis` is
    /// the reference point for eviction. Used directly by tests.
    pub fn append_at(&mut self, reading: Reading, now_millis: i64) -> usize {
        self.readings.push(reading);

        let cutoff = now_millis - self.horizon_millis;
        let before = self.readings.len();
        // Readings exactly at the horizon boundary stay; only strictly
        // older ones are dropped.
        self.readings.retain(|r| r.timestamp_millis >= cutoff);
        before - self.readings.len()
    }

    /// The most recently appended reading, or [`Reading::SENTINEL`] if
    /// nothing has arrived yet.
    pub fn latest(&self) -> Reading {
        self.readings.last().copied().unwrap_or(Reading::SENTINEL)
    }

    /// Owned copy of the current windowed sequence, oldest first.
    pub fn snapshot(&self) -> Vec<Reading> {
        self.readings.clone()
    }

    /// Number of readings currently retained.
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// True if no readings are currently retained.
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }
}

impl Default for RollingWindow {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION)
    }
}
