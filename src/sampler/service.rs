//! The sampling service: lifecycle owner of sensor acquisition.
//!
//! One long-lived background thread per measuring session. The thread
//! performs the capability check, registers the sensor callback, then sits
//! in the liveness tick loop re-arming the wake guard until it is
//! cancelled or the source faults. Deregistration and wake release run on
//! every exit path out of the measuring phase.

use crate::relay::RelayDispatcher;
use crate::sampler::source::{Availability, HeartRateSource, ReadingSink, SourceError};
use crate::sampler::wake::WakeGuard;
use crate::signals::{Alert, SignalHub};
use crate::stats::SharedSessionStats;
use crate::transport::PeerLink;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Interval of the liveness tick while measuring. Also the upper bound on
/// stop latency: the tick loop observes cancellation at most one interval
/// after it is requested.
pub const LIVENESS_TICK: Duration = Duration::from_secs(1);

/// Lifecycle phase of the sampling service. Written only by the service;
/// everyone else reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RunState {
    Idle = 0,
    Starting = 1,
    Measuring = 2,
    Stopping = 3,
}

impl RunState {
    fn from_u8(raw: u8) -> RunState {
        match raw {
            1 => RunState::Starting,
            2 => RunState::Measuring,
            3 => RunState::Stopping,
            _ => RunState::Idle,
        }
    }
}

/// Errors surfaced by [`SamplerService::start`] or logged by the session
/// thread when measuring ends unexpectedly.
#[derive(Debug)]
pub enum SamplerError {
    /// The sensor permission has not been granted; the user must act.
    PermissionDenied,
    /// The hardware cannot measure heart rate.
    Unsupported,
    /// The source failed to register or faulted while measuring.
    Source(SourceError),
    /// The control channel vanished while measuring.
    ControlChannelClosed,
}

impl std::fmt::Display for SamplerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SamplerError::PermissionDenied => write!(f, "sensor permission not granted"),
            SamplerError::Unsupported => write!(f, "heart rate unsupported on this hardware"),
            SamplerError::Source(e) => write!(f, "sensor source error: {e}"),
            SamplerError::ControlChannelClosed => write!(f, "sampler control channel closed"),
        }
    }
}

impl std::error::Error for SamplerError {}

impl From<SourceError> for SamplerError {
    fn from(e: SourceError) -> Self {
        SamplerError::Source(e)
    }
}

/// Owns the sampling lifecycle for one source/dispatcher pair.
pub struct SamplerService<S: HeartRateSource + 'static, L: PeerLink + 'static> {
    source: Arc<Mutex<S>>,
    dispatcher: Arc<RelayDispatcher<L>>,
    signals: SignalHub,
    stats: SharedSessionStats,
    wake: Arc<WakeGuard>,
    state: Arc<AtomicU8>,
    tick: Duration,
    stop_tx: Mutex<Option<Sender<()>>>,
    session: Mutex<Option<JoinHandle<()>>>,
}

impl<S: HeartRateSource + 'static, L: PeerLink + 'static> SamplerService<S, L> {
    pub fn new(
        source: S,
        dispatcher: RelayDispatcher<L>,
        signals: SignalHub,
        stats: SharedSessionStats,
    ) -> Self {
        Self {
            source: Arc::new(Mutex::new(source)),
            dispatcher: Arc::new(dispatcher),
            signals,
            stats,
            wake: Arc::new(WakeGuard::default()),
            state: Arc::new(AtomicU8::new(RunState::Idle as u8)),
            tick: LIVENESS_TICK,
            stop_tx: Mutex::new(None),
            session: Mutex::new(None),
        }
    }

    /// Override tick interval and wake timeout. Intended for tests and
    /// embedding configs.
    pub fn with_timing(mut self, tick: Duration, wake_timeout: Duration) -> Self {
        self.tick = tick;
        self.wake = Arc::new(WakeGuard::new(wake_timeout));
        self
    }

    /// Current lifecycle phase.
    pub fn run_state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// The wake resource this service keeps alive while measuring.
    pub fn wake(&self) -> &WakeGuard {
        &self.wake
    }

    /// Begin a measuring session.
    ///
    /// Idempotent: a start while the service is not idle is a logged no-op.
    /// Fails synchronously only on the permission gate; capability checking
    /// happens on the session thread and surfaces through the alert cell.
    pub fn start(&self) -> Result<(), SamplerError> {
        {
            let source = self.source.lock().expect("sampler source lock poisoned");
            if !source.permission_granted() {
                self.signals.set_permissions_granted(false);
                self.signals.raise_alert(Alert::PermissionDenied);
                warn!("start refused: sensor permission not granted");
                return Err(SamplerError::PermissionDenied);
            }
        }
        self.signals.set_permissions_granted(true);

        let claimed = self.state.compare_exchange(
            RunState::Idle as u8,
            RunState::Starting as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
        if claimed.is_err() {
            debug!(state = ?self.run_state(), "start ignored, service not idle");
            return Ok(());
        }

        // Reap a session thread that ended on its own (fault path).
        if let Some(handle) = self.session.lock().expect("session lock poisoned").take() {
            let _ = handle.join();
        }

        // Fresh cancellation channel per session. A stop issued while we
        // are still Starting parks here and is observed on the first tick.
        let (stop_tx, stop_rx) = bounded::<()>(1);
        *self.stop_tx.lock().expect("stop channel lock poisoned") = Some(stop_tx);

        let ctx = SessionCtx {
            source: Arc::clone(&self.source),
            dispatcher: Arc::clone(&self.dispatcher),
            signals: self.signals.clone(),
            stats: Arc::clone(&self.stats),
            wake: Arc::clone(&self.wake),
            state: Arc::clone(&self.state),
            tick: self.tick,
        };
        let handle = thread::spawn(move || ctx.run(stop_rx));
        *self.session.lock().expect("session lock poisoned") = Some(handle);

        info!("sampling session starting");
        Ok(())
    }

    /// Request cancellation and wait for the session thread to wind down.
    ///
    /// Takes effect within one tick interval once measuring; a stop issued
    /// during startup is queued and applied as soon as the measuring loop
    /// first polls. Idempotent; a stop while idle does nothing.
    pub fn stop(&self) {
        let tx = self.stop_tx.lock().expect("stop channel lock poisoned").take();
        if let Some(tx) = tx {
            // The session may already be gone; a dead channel is fine.
            let _ = tx.try_send(());
        }
        if let Some(handle) = self.session.lock().expect("session lock poisoned").take() {
            let _ = handle.join();
        }
    }
}

/// Everything the session thread needs, detached from the service handle.
struct SessionCtx<S: HeartRateSource, L: PeerLink> {
    source: Arc<Mutex<S>>,
    dispatcher: Arc<RelayDispatcher<L>>,
    signals: SignalHub,
    stats: SharedSessionStats,
    wake: Arc<WakeGuard>,
    state: Arc<AtomicU8>,
    tick: Duration,
}

impl<S: HeartRateSource, L: PeerLink + 'static> SessionCtx<S, L> {
    fn run(self, stop_rx: Receiver<()>) {
        self.wake.bump();
        let outcome = self.measure(&stop_rx);

        // Cleanup runs no matter how the measuring phase ended.
        if self.state.load(Ordering::SeqCst) == RunState::Measuring as u8 {
            self.state.store(RunState::Stopping as u8, Ordering::SeqCst);
        }
        self.source
            .lock()
            .expect("sampler source lock poisoned")
            .unregister();
        self.wake.release();
        self.state.store(RunState::Idle as u8, Ordering::SeqCst);
        self.signals.set_running(false);

        match outcome {
            Ok(()) => info!("sampling session stopped"),
            Err(SamplerError::Unsupported) => {
                // Alert already raised; never entered the measuring phase.
            }
            Err(e) => error!(error = %e, "measuring ended unexpectedly"),
        }
    }

    fn measure(&self, stop_rx: &Receiver<()>) -> Result<(), SamplerError> {
        {
            let source = self.source.lock().expect("sampler source lock poisoned");
            if !source.supports_heart_rate() {
                warn!("heart rate not supported on this hardware");
                self.signals.raise_alert(Alert::HeartRateUnsupported);
                return Err(SamplerError::Unsupported);
            }
        }

        let sink = self.make_sink();
        self.source
            .lock()
            .expect("sampler source lock poisoned")
            .register(sink)?;

        self.state.store(RunState::Measuring as u8, Ordering::SeqCst);
        self.signals.set_running(true);
        info!("measuring");

        let mut last_availability: Option<Availability> = None;
        loop {
            match stop_rx.recv_timeout(self.tick) {
                Err(RecvTimeoutError::Timeout) => {
                    self.wake.bump();

                    let mut source =
                        self.source.lock().expect("sampler source lock poisoned");
                    let availability = source.availability();
                    if last_availability != Some(availability) {
                        debug!(?availability, "sensor availability changed");
                        last_availability = Some(availability);
                    }
                    if let Some(fault) = source.take_fault() {
                        return Err(fault.into());
                    }
                }
                Ok(()) => {
                    debug!("stop requested");
                    return Ok(());
                }
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(SamplerError::ControlChannelClosed);
                }
            }
        }
    }

    /// One reading per sensor callback: publish locally, then hand to the
    /// dispatcher synchronously before the callback returns.
    fn make_sink(&self) -> ReadingSink {
        let signals = self.signals.clone();
        let dispatcher = Arc::clone(&self.dispatcher);
        let stats = Arc::clone(&self.stats);
        Arc::new(move |reading| {
            stats.record_reading_sampled();
            signals.publish_reading(reading);
            dispatcher.dispatch(&reading);
        })
    }
}
