//! Timeout-armed wake resource.
//!
//! While the sampling loop is measuring it bumps this guard once per
//! liveness tick; each bump re-arms a fixed timeout instead of stacking
//! acquisitions, so a crashed loop can hold the resource for at most one
//! timeout. The platform layer maps "held" onto whatever keeps the device
//! awake.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// How long one bump keeps the resource held.
pub const DEFAULT_WAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Single-slot wake handle. Never reference-counted deeper than one:
/// repeated bumps extend the deadline, release drops it entirely.
#[derive(Debug)]
pub struct WakeGuard {
    timeout: Duration,
    deadline: Mutex<Option<Instant>>,
}

impl WakeGuard {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            deadline: Mutex::new(None),
        }
    }

    /// Acquire or extend the hold for one timeout period from now.
    pub fn bump(&self) {
        let mut deadline = self.deadline.lock().expect("wake guard lock poisoned");
        *deadline = Some(Instant::now() + self.timeout);
    }

    /// Drop the hold. Idempotent and safe to call when not held.
    pub fn release(&self) {
        let mut deadline = self.deadline.lock().expect("wake guard lock poisoned");
        *deadline = None;
    }

    /// True while a bump is still within its timeout window.
    pub fn is_held(&self) -> bool {
        let deadline = self.deadline.lock().expect("wake guard lock poisoned");
        deadline.map(|d| Instant::now() < d).unwrap_or(false)
    }
}

impl Default for WakeGuard {
    fn default() -> Self {
        Self::new(DEFAULT_WAKE_TIMEOUT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_starts_unheld() {
        let guard = WakeGuard::default();
        assert!(!guard.is_held());
    }

    #[test]
    fn test_bump_then_release() {
        let guard = WakeGuard::default();
        guard.bump();
        assert!(guard.is_held());
        guard.release();
        assert!(!guard.is_held());
    }

    #[test]
    fn test_release_is_idempotent() {
        let guard = WakeGuard::default();
        guard.release();
        guard.bump();
        guard.release();
        guard.release();
        assert!(!guard.is_held());
    }

    #[test]
    fn test_hold_expires_without_bumps() {
        let guard = WakeGuard::new(Duration::from_millis(20));
        guard.bump();
        assert!(guard.is_held());
        thread::sleep(Duration::from_millis(40));
        assert!(!guard.is_held());
    }

    #[test]
    fn test_bump_extends_instead_of_stacking() {
        let guard = WakeGuard::new(Duration::from_millis(100));
        guard.bump();
        thread::sleep(Duration::from_millis(60));
        guard.bump();
        thread::sleep(Duration::from_millis(60));
        // Still held: the second bump re-armed the full timeout, while the
        // first alone would have expired by now.
        assert!(guard.is_held());
    }
}
