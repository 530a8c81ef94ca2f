//! Observable state cells shared between the pipeline and its observers.
//!
//! Each cell is a last-value-wins slot, not a queue: a slow observer sees
//! the newest value and may miss intermediate ones. Cells are single-writer
//! (the component that owns the state) and multi-reader (UI observers).
//! Readers must treat values from different cells as eventually-consistent
//! snapshots; "latest reading" and "run state" update at slightly different
//! moments even when causally related.
//!
//! The hub is passed by reference to whichever components need it instead
//! of living in process-wide statics.

use crate::wire::Reading;
use std::sync::Arc;
use tokio::sync::watch;

/// One-shot, user-visible alerts raised by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    /// The hardware cannot measure heart rate; sampling aborted startup.
    HeartRateUnsupported,
    /// Sampling is blocked until the user grants the sensor permission.
    PermissionDenied,
}

struct HubInner {
    run_state: watch::Sender<bool>,
    reading: watch::Sender<Reading>,
    battery_level: watch::Sender<i32>,
    permissions_granted: watch::Sender<bool>,
    alert: watch::Sender<Option<Alert>>,
}

/// Cheaply cloneable handle to the shared observable cells.
#[derive(Clone)]
pub struct SignalHub {
    inner: Arc<HubInner>,
}

impl SignalHub {
    /// Create a hub with every cell at its resting value: not running, the
    /// sentinel reading, battery unknown (-1), permissions not granted, no
    /// alert.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(HubInner {
                run_state: watch::channel(false).0,
                reading: watch::channel(Reading::SENTINEL).0,
                battery_level: watch::channel(-1).0,
                permissions_granted: watch::channel(false).0,
                alert: watch::channel(None).0,
            }),
        }
    }

    // --- writers (single-writer discipline; see module docs) ---

    /// Written only by the sampling service.
    pub fn set_running(&self, running: bool) {
        self.inner.run_state.send_replace(running);
    }

    /// Written by the sampling service on the wearable and by the inbound
    /// listener on the handheld.
    pub fn publish_reading(&self, reading: Reading) {
        self.inner.reading.send_replace(reading);
    }

    /// Written by platform glue reporting the counterpart's battery.
    pub fn set_battery_level(&self, percent: i32) {
        self.inner.battery_level.send_replace(percent);
    }

    /// Written by platform glue after the permission prompt resolves.
    pub fn set_permissions_granted(&self, granted: bool) {
        self.inner.permissions_granted.send_replace(granted);
    }

    /// Raise a user-visible alert. Last alert wins.
    pub fn raise_alert(&self, alert: Alert) {
        self.inner.alert.send_replace(Some(alert));
    }

    // --- readers ---

    /// Subscribe to run-state changes. `true` while the sampler is
    /// measuring.
    pub fn watch_running(&self) -> watch::Receiver<bool> {
        self.inner.run_state.subscribe()
    }

    /// Subscribe to the latest-reading cell.
    pub fn watch_reading(&self) -> watch::Receiver<Reading> {
        self.inner.reading.subscribe()
    }

    /// Subscribe to battery-level changes.
    pub fn watch_battery_level(&self) -> watch::Receiver<i32> {
        self.inner.battery_level.subscribe()
    }

    /// Subscribe to the permission cell.
    pub fn watch_permissions(&self) -> watch::Receiver<bool> {
        self.inner.permissions_granted.subscribe()
    }

    /// Subscribe to alerts.
    pub fn watch_alert(&self) -> watch::Receiver<Option<Alert>> {
        self.inner.alert.subscribe()
    }

    /// Current run-state value without subscribing.
    pub fn is_running(&self) -> bool {
        *self.inner.run_state.borrow()
    }

    /// Current latest-reading value without subscribing.
    pub fn latest_reading(&self) -> Reading {
        *self.inner.reading.borrow()
    }
}

impl Default for SignalHub {
    fn default() -> Self {
        Self::new()
    }
}
