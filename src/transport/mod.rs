//! Message-channel boundary between the two devices.
//!
//! The pipeline talks to the channel through two narrow traits: [`PeerLink`]
//! for the publishing side (the wearable's dispatcher) and
//! [`MessageSubscriber`] for the receiving side (the handheld's listener).
//! Real short-range radios live behind these traits; the in-process
//! [`loopback`] hub implements both for the demo binary and tests.

pub mod loopback;

pub use loopback::{LoopbackHub, LoopbackNode};

use crossbeam_channel::Receiver;

/// Identifier of a reachable counterpart device.
///
/// The set of targets is queried fresh at every dispatch; reachability
/// changes are external to this crate and never cached here.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeerTarget {
    pub id: String,
}

impl PeerTarget {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl std::fmt::Display for PeerTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// A payload delivered by the channel, tagged with its origin and path.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub source: PeerTarget,
    pub path: String,
    pub payload: Vec<u8>,
}

/// Handle identifying an active subscription.
pub type SubscriptionId = u64;

/// An active path subscription: the id to unsubscribe with and the
/// store-and-forward queue of delivered messages.
pub struct Subscription {
    pub id: SubscriptionId,
    pub receiver: Receiver<InboundMessage>,
}

/// Channel-level failures. Contained per-peer at the dispatcher; never
/// propagated to its caller.
#[derive(Debug, Clone)]
pub enum TransportError {
    /// The target peer is no longer part of the channel.
    PeerUnreachable(PeerTarget),
    /// The underlying channel rejected or lost the send.
    Closed(String),
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportError::PeerUnreachable(peer) => {
                write!(f, "peer {peer} is not reachable")
            }
            TransportError::Closed(msg) => write!(f, "channel closed: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Publishing side of the channel.
pub trait PeerLink: Send + Sync {
    /// The currently reachable counterpart devices. Called fresh on every
    /// dispatch.
    fn reachable_peers(&self) -> Vec<PeerTarget>;

    /// Fire-and-forget send of one payload to one peer. Must not block on
    /// delivery confirmation; delivery is not acknowledged or retried.
    fn send_to(&self, peer: &PeerTarget, path: &str, payload: &[u8])
        -> Result<(), TransportError>;
}

/// Receiving side of the channel.
pub trait MessageSubscriber: Send + Sync {
    /// Start receiving payloads published to `path`.
    fn subscribe(&self, path: &str) -> Subscription;

    /// Stop receiving for a previous [`subscribe`](Self::subscribe) call.
    /// Safe to call with an id that is already gone.
    fn unsubscribe(&self, id: SubscriptionId);
}
