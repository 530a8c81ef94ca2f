//! Wire format for heart-rate readings.
//!
//! Both devices exchange single readings as fixed-size binary records over
//! the message channel. The layout is an explicit, versioned little-endian
//! schema so the two builds can detect skew instead of silently
//! misinterpreting each other's bytes.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Message-channel path for heart-rate records. The path string and the
/// record layout below are the entire wire contract between the devices.
pub const HR_MESSAGE_PATH: &str = "/sensors/heart_rate";

/// Current wire schema version. Bump on any layout change.
pub const WIRE_VERSION: u8 = 1;

/// Encoded record size: 1 version byte + 8 bytes f64 + 8 bytes i64.
pub const RECORD_LEN: usize = 17;

/// One heart-rate sample: a value in bpm and the moment it was measured.
///
/// Readings are immutable once created. Ordering is by timestamp only; two
/// readings may share a timestamp and are not deduplicated anywhere in the
/// pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Heart rate in beats per minute.
    pub value: f64,
    /// Milliseconds since the Unix epoch at measurement time.
    pub timestamp_millis: i64,
}

impl Reading {
    /// The "no reading yet" value observers see before the first sample.
    pub const SENTINEL: Reading = Reading {
        value: 0.0,
        timestamp_millis: 0,
    };

    /// Create a reading stamped with the current wall-clock time.
    pub fn now(value: f64) -> Self {
        Self {
            value,
            timestamp_millis: Utc::now().timestamp_millis(),
        }
    }

    /// Create a reading with an explicit timestamp.
    pub fn at(value: f64, timestamp_millis: i64) -> Self {
        Self {
            value,
            timestamp_millis,
        }
    }

    /// Age of this reading relative to `now_millis`. Negative if the
    /// reading is stamped in the future (clock skew between devices).
    pub fn age_millis(&self, now_millis: i64) -> i64 {
        now_millis - self.timestamp_millis
    }
}

impl PartialOrd for Reading {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.timestamp_millis.cmp(&other.timestamp_millis))
    }
}

/// Errors produced by [`decode`]. Decoding is all-or-nothing; a failed
/// decode leaves no partial reading behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte sequence is not exactly one record long.
    Length { expected: usize, actual: usize },
    /// The version byte does not match this build's schema.
    Version(u8),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Length { expected, actual } => {
                write!(f, "record length mismatch: expected {expected} bytes, got {actual}")
            }
            DecodeError::Version(v) => {
                write!(f, "unknown wire version {v} (this build speaks {WIRE_VERSION})")
            }
        }
    }
}

impl std::error::Error for DecodeError {}

/// Encode one reading into its fixed-size wire record.
///
/// Total and deterministic: the same reading always yields byte-identical
/// output.
pub fn encode(reading: &Reading) -> [u8; RECORD_LEN] {
    let mut buf = [0u8; RECORD_LEN];
    buf[0] = WIRE_VERSION;
    buf[1..9].copy_from_slice(&reading.value.to_le_bytes());
    buf[9..17].copy_from_slice(&reading.timestamp_millis.to_le_bytes());
    buf
}

/// Decode a wire record back into a reading.
pub fn decode(bytes: &[u8]) -> Result<Reading, DecodeError> {
    if bytes.len() != RECORD_LEN {
        return Err(DecodeError::Length {
            expected: RECORD_LEN,
            actual: bytes.len(),
        });
    }
    if bytes[0] != WIRE_VERSION {
        return Err(DecodeError::Version(bytes[0]));
    }

    let mut value = [0u8; 8];
    value.copy_from_slice(&bytes[1..9]);
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&bytes[9..17]);

    Ok(Reading {
        value: f64::from_le_bytes(value),
        timestamp_millis: i64::from_le_bytes(ts),
    })
}
