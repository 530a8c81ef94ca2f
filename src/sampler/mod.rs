//! Sensor acquisition: lifecycle service, source abstraction, wake guard.

pub mod service;
pub mod source;
pub mod wake;

pub use service::{RunState, SamplerError, SamplerService, LIVENESS_TICK};
pub use source::{
    Availability, HeartRateSource, ReadingSink, SimProbe, SimulatedHeartRateSource, SourceError,
};
pub use wake::{WakeGuard, DEFAULT_WAKE_TIMEOUT};
