//! Per-session counters for the relay pipeline.
//!
//! Tracks how many readings flowed through each stage of the pipeline.
//! In-memory only; the demo binary prints the summary on exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Atomic counters for the current session.
#[derive(Debug)]
pub struct SessionStats {
    /// Readings produced by the sensor callback
    readings_sampled: AtomicU64,
    /// Dispatch invocations (one per reading handed to the relay)
    dispatches: AtomicU64,
    /// Individual per-peer sends that failed
    sends_failed: AtomicU64,
    /// Payloads received from the channel
    messages_received: AtomicU64,
    /// Payloads dropped because they failed to decode
    decode_failures: AtomicU64,
    /// Readings evicted from the rolling window
    readings_evicted: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            readings_sampled: AtomicU64::new(0),
            dispatches: AtomicU64::new(0),
            sends_failed: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            readings_evicted: AtomicU64::new(0),
            session_start: Utc::now(),
        }
    }

    pub fn record_reading_sampled(&self) {
        self.readings_sampled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dispatch(&self) {
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_send_failed(&self) {
        self.sends_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.readings_evicted.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            readings_sampled: self.readings_sampled.load(Ordering::Relaxed),
            dispatches: self.dispatches.load(Ordering::Relaxed),
            sends_failed: self.sends_failed.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            readings_evicted: self.readings_evicted.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds() as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Session Statistics:\n\
             - Readings sampled: {}\n\
             - Dispatches: {}\n\
             - Failed peer sends: {}\n\
             - Messages received: {}\n\
             - Decode failures: {}\n\
             - Readings evicted from window: {}\n\
             - Session duration: {} seconds",
            s.readings_sampled,
            s.dispatches,
            s.sends_failed,
            s.messages_received,
            s.decode_failures,
            s.readings_evicted,
            s.session_duration_secs
        )
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub readings_sampled: u64,
    pub dispatches: u64,
    pub sends_failed: u64,
    pub messages_received: u64,
    pub decode_failures: u64,
    pub readings_evicted: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Thread-safe shared stats handle.
pub type SharedSessionStats = Arc<SessionStats>;

/// Create a new shared stats handle.
pub fn create_shared_stats() -> SharedSessionStats {
    Arc::new(SessionStats::new())
}
