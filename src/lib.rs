//! Pulselink - two-device heart-rate telemetry relay.
//!
//! A wearable samples heart rate continuously and streams each reading to
//! a paired handheld over a short-range, store-and-forward message
//! channel; the handheld keeps a one-minute rolling window of readings for
//! its chart. Delivery is lossy by design: live data supersedes missed
//! data, so nothing is acknowledged, retried, or persisted.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────── wearable ─────────────────┐   ┌─────────── handheld ───────────┐
//! │  ┌─────────┐   ┌──────────┐   ┌─────────┐  │   │  ┌──────────┐   ┌───────────┐  │
//! │  │  Sensor │──▶│ Sampling │──▶│  Relay  │──┼──▶│  │ Inbound  │──▶│  Rolling  │  │
//! │  │  Source │   │ Service  │   │Dispatch │  │   │  │ Listener │   │  Window   │  │
//! │  └─────────┘   └──────────┘   └─────────┘  │   │  └──────────┘   └───────────┘  │
//! │                     │                      │   │        │                       │
//! │                     ▼                      │   │        ▼                       │
//! │               ┌──────────┐                 │   │  ┌──────────┐                  │
//! │               │WakeGuard │                 │   │  │ Signals  │──▶ display       │
//! │               └──────────┘                 │   │  └──────────┘                  │
//! └────────────────────────────────────────────┘   └────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use pulselink::sampler::{SamplerService, SimulatedHeartRateSource};
//! use pulselink::relay::RelayDispatcher;
//! use pulselink::signals::SignalHub;
//! use pulselink::stats::create_shared_stats;
//! use pulselink::transport::LoopbackHub;
//!
//! let hub = LoopbackHub::new();
//! let wearable = hub.join("wearable");
//!
//! let signals = SignalHub::new();
//! let stats = create_shared_stats();
//! let dispatcher = RelayDispatcher::new(wearable, stats.clone());
//! let source = SimulatedHeartRateSource::new(72.0, 1.0);
//!
//! let service = SamplerService::new(source, dispatcher, signals, stats);
//! service.start().expect("failed to start sampling");
//! ```

pub mod config;
pub mod listener;
pub mod relay;
pub mod sampler;
pub mod signals;
pub mod stats;
pub mod transport;
pub mod window;
pub mod wire;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, SimConfig};
pub use listener::InboundListener;
pub use relay::RelayDispatcher;
pub use sampler::{RunState, SamplerError, SamplerService, SimulatedHeartRateSource, WakeGuard};
pub use signals::{Alert, SignalHub};
pub use stats::{create_shared_stats, SessionStats, SharedSessionStats, StatsSnapshot};
pub use transport::{
    InboundMessage, LoopbackHub, LoopbackNode, MessageSubscriber, PeerLink, PeerTarget,
    Subscription, TransportError,
};
pub use window::RollingWindow;
pub use wire::{decode, encode, DecodeError, Reading, HR_MESSAGE_PATH, RECORD_LEN, WIRE_VERSION};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Wire-contract declaration that can be displayed to users and kept next
/// to firmware release notes. Both builds must agree on every line.
pub const WIRE_SCHEMA: &str = r#"
╔══════════════════════════════════════════════════════════════════╗
║                 PULSELINK WIRE SCHEMA - VERSION 1                ║
╠══════════════════════════════════════════════════════════════════╣
║                                                                  ║
║  Channel path:  /sensors/heart_rate                              ║
║                                                                  ║
║  Record layout (17 bytes, little-endian):                        ║
║    offset 0   u8    wire version (currently 1)                   ║
║    offset 1   f64   heart rate, beats per minute                 ║
║    offset 9   i64   timestamp, milliseconds since Unix epoch     ║
║                                                                  ║
║  One record per message. No length prefix, no framing beyond     ║
║  the message boundary provided by the channel itself.            ║
║                                                                  ║
║  Decoders reject any record whose length is not exactly 17       ║
║  bytes or whose version byte is unknown. There is no partial     ║
║  decoding and no cross-version compatibility: bump the version   ║
║  byte on any layout change and update both devices together.     ║
║                                                                  ║
╚══════════════════════════════════════════════════════════════════╝
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_schema_matches_constants() {
        assert!(WIRE_SCHEMA.contains(HR_MESSAGE_PATH));
        assert!(WIRE_SCHEMA.contains("17 bytes"));
        assert!(WIRE_SCHEMA.contains(&format!("VERSION {WIRE_VERSION}")));
    }
}
