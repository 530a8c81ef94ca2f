//! Heart-rate sensor abstraction and the simulated source.
//!
//! The sampling service drives any [`HeartRateSource`]. Real hardware
//! backends register a callback with the platform's health stack; the
//! simulated source emits a synthetic waveform from its own thread and is
//! what the demo binary and the tests run against.

use crate::wire::Reading;
use crossbeam_channel::{bounded, Sender};
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Callback invoked once per sensor sample.
pub type ReadingSink = Arc<dyn Fn(Reading) + Send + Sync>;

/// Signal availability as reported by the sensor hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// The sensor is delivering samples.
    Available,
    /// The sensor is warming up or searching for a signal.
    Acquiring,
    /// No usable signal (e.g. device not worn).
    Unavailable,
}

/// Errors raised by a sensor source.
#[derive(Debug, Clone)]
pub enum SourceError {
    /// This hardware cannot measure heart rate at all.
    Unsupported,
    /// A callback is already registered.
    AlreadyRegistered,
    /// The sensor backend failed while measuring.
    Fault(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Unsupported => write!(f, "heart rate is not supported on this hardware"),
            SourceError::AlreadyRegistered => write!(f, "a measure callback is already registered"),
            SourceError::Fault(msg) => write!(f, "sensor fault: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

/// A source of heart-rate samples.
///
/// `register` must arrange for the sink to be invoked exactly once per
/// sensor sample; `unregister` must stop invocations and is safe to call
/// when nothing is registered.
pub trait HeartRateSource: Send {
    /// Whether this platform's permission gate allows sampling.
    fn permission_granted(&self) -> bool {
        true
    }

    /// Capability check, performed once during startup.
    fn supports_heart_rate(&self) -> bool;

    /// Current signal availability. Polled by the service for logging.
    fn availability(&self) -> Availability;

    /// Begin delivering samples to `sink`.
    fn register(&mut self, sink: ReadingSink) -> Result<(), SourceError>;

    /// Stop delivering samples. Idempotent.
    fn unregister(&mut self);

    /// A fault raised since the last check, if any. The service polls this
    /// every liveness tick and tears the session down on `Some`.
    fn take_fault(&mut self) -> Option<SourceError> {
        None
    }
}

const AVAIL_AVAILABLE: u8 = 0;
const AVAIL_ACQUIRING: u8 = 1;
const AVAIL_UNAVAILABLE: u8 = 2;

/// State shared between the simulated source, its emit thread, and test
/// probes.
#[derive(Debug)]
struct SimShared {
    registrations: AtomicUsize,
    emitted: AtomicUsize,
    availability: AtomicU8,
    fault: Mutex<Option<SourceError>>,
}

/// Test/demo probe into a [`SimulatedHeartRateSource`], usable after the
/// source itself has been handed to the service.
#[derive(Clone)]
pub struct SimProbe {
    shared: Arc<SimShared>,
}

impl SimProbe {
    /// Number of currently registered callbacks (0 or 1 in practice).
    pub fn registration_count(&self) -> usize {
        self.shared.registrations.load(Ordering::SeqCst)
    }

    /// Total samples emitted so far.
    pub fn emitted_count(&self) -> usize {
        self.shared.emitted.load(Ordering::SeqCst)
    }

    /// Make the source report a fault on the service's next poll.
    pub fn inject_fault(&self, message: &str) {
        let mut fault = self.shared.fault.lock().expect("sim fault lock poisoned");
        *fault = Some(SourceError::Fault(message.to_string()));
    }

    /// Override the reported availability.
    pub fn set_availability(&self, availability: Availability) {
        let raw = match availability {
            Availability::Available => AVAIL_AVAILABLE,
            Availability::Acquiring => AVAIL_ACQUIRING,
            Availability::Unavailable => AVAIL_UNAVAILABLE,
        };
        self.shared.availability.store(raw, Ordering::SeqCst);
    }
}

/// Synthetic heart-rate source: a slow sine swing around a base rate.
pub struct SimulatedHeartRateSource {
    base_bpm: f64,
    sample_interval: Duration,
    supported: bool,
    permitted: bool,
    shared: Arc<SimShared>,
    stop_tx: Option<Sender<()>>,
    emit_thread: Option<JoinHandle<()>>,
}

impl SimulatedHeartRateSource {
    /// A source emitting at `rate_hz` around `base_bpm`.
    pub fn new(base_bpm: f64, rate_hz: f64) -> Self {
        let rate_hz = if rate_hz > 0.0 { rate_hz } else { 1.0 };
        Self {
            base_bpm,
            sample_interval: Duration::from_secs_f64(1.0 / rate_hz),
            supported: true,
            permitted: true,
            shared: Arc::new(SimShared {
                registrations: AtomicUsize::new(0),
                emitted: AtomicUsize::new(0),
                availability: AtomicU8::new(AVAIL_ACQUIRING),
                fault: Mutex::new(None),
            }),
            stop_tx: None,
            emit_thread: None,
        }
    }

    /// Pretend the hardware lacks a heart-rate sensor.
    pub fn unsupported(mut self) -> Self {
        self.supported = false;
        self
    }

    /// Pretend the sensor permission was denied.
    pub fn permission_denied(mut self) -> Self {
        self.permitted = false;
        self
    }

    /// Probe handle for tests and the demo binary.
    pub fn probe(&self) -> SimProbe {
        SimProbe {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl HeartRateSource for SimulatedHeartRateSource {
    fn permission_granted(&self) -> bool {
        self.permitted
    }

    fn supports_heart_rate(&self) -> bool {
        self.supported
    }

    fn availability(&self) -> Availability {
        match self.shared.availability.load(Ordering::SeqCst) {
            AVAIL_AVAILABLE => Availability::Available,
            AVAIL_ACQUIRING => Availability::Acquiring,
            _ => Availability::Unavailable,
        }
    }

    fn register(&mut self, sink: ReadingSink) -> Result<(), SourceError> {
        if self.shared.registrations.load(Ordering::SeqCst) > 0 {
            return Err(SourceError::AlreadyRegistered);
        }
        self.shared.registrations.fetch_add(1, Ordering::SeqCst);

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let shared = Arc::clone(&self.shared);
        let base = self.base_bpm;
        let interval = self.sample_interval;

        let handle = thread::spawn(move || {
            let mut elapsed = 0.0f64;
            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
                    Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
                }
                elapsed += interval.as_secs_f64();

                // Slow swing around the base rate, roughly one cycle per
                // 20 seconds.
                let value = base + 8.0 * (elapsed * std::f64::consts::TAU / 20.0).sin();
                shared
                    .availability
                    .store(AVAIL_AVAILABLE, Ordering::SeqCst);
                shared.emitted.fetch_add(1, Ordering::SeqCst);
                sink(Reading::now(value));
            }
        });

        self.stop_tx = Some(stop_tx);
        self.emit_thread = Some(handle);
        Ok(())
    }

    fn unregister(&mut self) {
        let was_registered = self.stop_tx.take().is_some();
        if let Some(handle) = self.emit_thread.take() {
            // Dropping stop_tx above disconnects the emit loop; join to
            // guarantee no sink invocation outlives deregistration.
            let _ = handle.join();
        }
        if was_registered {
            self.shared.registrations.fetch_sub(1, Ordering::SeqCst);
            self.shared
                .availability
                .store(AVAIL_ACQUIRING, Ordering::SeqCst);
        }
    }

    fn take_fault(&mut self) -> Option<SourceError> {
        self.shared
            .fault
            .lock()
            .expect("sim fault lock poisoned")
            .take()
    }
}

impl Drop for SimulatedHeartRateSource {
    fn drop(&mut self) {
        self.unregister();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_register_emits_readings() {
        let mut source = SimulatedHeartRateSource::new(72.0, 100.0);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);

        source
            .register(Arc::new(move |reading| {
                assert!(reading.value > 0.0);
                assert!(reading.timestamp_millis > 0);
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();

        thread::sleep(Duration::from_millis(100));
        source.unregister();

        assert!(seen.load(Ordering::SeqCst) > 0);
        assert_eq!(source.probe().registration_count(), 0);
    }

    #[test]
    fn test_double_register_is_rejected() {
        let mut source = SimulatedHeartRateSource::new(72.0, 100.0);
        source.register(Arc::new(|_| {})).unwrap();
        assert!(matches!(
            source.register(Arc::new(|_| {})),
            Err(SourceError::AlreadyRegistered)
        ));
        source.unregister();
    }

    #[test]
    fn test_unregister_is_idempotent() {
        let mut source = SimulatedHeartRateSource::new(72.0, 100.0);
        source.unregister();
        source.register(Arc::new(|_| {})).unwrap();
        source.unregister();
        source.unregister();
        assert_eq!(source.probe().registration_count(), 0);
    }

    #[test]
    fn test_no_emissions_after_unregister() {
        let mut source = SimulatedHeartRateSource::new(72.0, 100.0);
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = Arc::clone(&seen);
        source
            .register(Arc::new(move |_| {
                seen_clone.fetch_add(1, Ordering::SeqCst);
            }))
            .unwrap();
        thread::sleep(Duration::from_millis(50));
        source.unregister();

        let at_unregister = seen.load(Ordering::SeqCst);
        thread::sleep(Duration::from_millis(50));
        assert_eq!(seen.load(Ordering::SeqCst), at_unregister);
    }

    #[test]
    fn test_injected_fault_is_taken_once() {
        let mut source = SimulatedHeartRateSource::new(72.0, 100.0);
        source.probe().inject_fault("strap detached");
        assert!(matches!(
            source.take_fault(),
            Some(SourceError::Fault(msg)) if msg == "strap detached"
        ));
        assert!(source.take_fault().is_none());
    }
}
