//! In-process loopback implementation of the message channel.
//!
//! A [`LoopbackHub`] pairs any number of named nodes; each node can publish
//! to every other node and subscribe to paths on its own inbox. Delivery is
//! store-and-forward through unbounded channels: sends never block, order
//! is FIFO per sender, and messages published while nobody subscribes are
//! simply lost, which matches the at-most-available contract of the real
//! channel.

use crate::transport::{
    InboundMessage, MessageSubscriber, PeerLink, PeerTarget, Subscription, SubscriptionId,
    TransportError,
};
use crossbeam_channel::{unbounded, Sender};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

struct SubEntry {
    id: SubscriptionId,
    path: String,
    tx: Sender<InboundMessage>,
}

#[derive(Default)]
struct HubState {
    /// Per-node subscription lists, keyed by node id.
    inboxes: HashMap<String, Vec<SubEntry>>,
}

/// Shared rendezvous point for loopback nodes.
pub struct LoopbackHub {
    state: Mutex<HubState>,
    next_sub_id: AtomicU64,
}

impl LoopbackHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(HubState::default()),
            next_sub_id: AtomicU64::new(1),
        })
    }

    /// Attach a new node to the hub. The node id combines the given name
    /// with a random suffix so repeated joins stay distinct.
    pub fn join(self: &Arc<Self>, name: &str) -> LoopbackNode {
        let id = format!("{}-{}", name, &Uuid::new_v4().to_string()[..8]);
        self.state().inboxes.entry(id.clone()).or_default();
        LoopbackNode {
            hub: Arc::clone(self),
            local: PeerTarget::new(id),
        }
    }

    fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().expect("loopback hub state poisoned")
    }
}

/// One participant in a loopback pairing. Implements both sides of the
/// channel boundary.
pub struct LoopbackNode {
    hub: Arc<LoopbackHub>,
    local: PeerTarget,
}

impl LoopbackNode {
    /// This node's identity as seen by its peers.
    pub fn target(&self) -> &PeerTarget {
        &self.local
    }

    /// Detach this node from the hub, dropping its subscriptions.
    pub fn leave(&self) {
        self.hub.state().inboxes.remove(&self.local.id);
    }
}

impl PeerLink for LoopbackNode {
    fn reachable_peers(&self) -> Vec<PeerTarget> {
        self.hub
            .state()
            .inboxes
            .keys()
            .filter(|id| **id != self.local.id)
            .map(|id| PeerTarget::new(id.as_str()))
            .collect()
    }

    fn send_to(
        &self,
        peer: &PeerTarget,
        path: &str,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let mut state = self.hub.state();
        let inbox = state
            .inboxes
            .get_mut(&peer.id)
            .ok_or_else(|| TransportError::PeerUnreachable(peer.clone()))?;

        // Prune subscriptions whose receiver has gone away, then deliver to
        // every live subscriber of this path.
        inbox.retain(|entry| {
            if entry.path != path {
                return true;
            }
            entry
                .tx
                .send(InboundMessage {
                    source: self.local.clone(),
                    path: path.to_string(),
                    payload: payload.to_vec(),
                })
                .is_ok()
        });
        Ok(())
    }
}

impl MessageSubscriber for LoopbackNode {
    fn subscribe(&self, path: &str) -> Subscription {
        let (tx, rx) = unbounded();
        let id = self.hub.next_sub_id.fetch_add(1, Ordering::Relaxed);
        self.hub
            .state()
            .inboxes
            .entry(self.local.id.clone())
            .or_default()
            .push(SubEntry {
                id,
                path: path.to_string(),
                tx,
            });
        Subscription { id, receiver: rx }
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(inbox) = self.hub.state().inboxes.get_mut(&self.local.id) {
            inbox.retain(|entry| entry.id != id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::HR_MESSAGE_PATH;

    #[test]
    fn test_join_makes_peers_reachable() {
        let hub = LoopbackHub::new();
        let wearable = hub.join("wearable");
        assert!(wearable.reachable_peers().is_empty());

        let handheld = hub.join("handheld");
        let peers = wearable.reachable_peers();
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0], *handheld.target());
    }

    #[test]
    fn test_delivery_is_path_scoped_and_fifo() {
        let hub = LoopbackHub::new();
        let wearable = hub.join("wearable");
        let handheld = hub.join("handheld");

        let sub = handheld.subscribe(HR_MESSAGE_PATH);
        wearable
            .send_to(handheld.target(), HR_MESSAGE_PATH, &[1])
            .unwrap();
        wearable
            .send_to(handheld.target(), "/sensors/other", &[9])
            .unwrap();
        wearable
            .send_to(handheld.target(), HR_MESSAGE_PATH, &[2])
            .unwrap();

        let first = sub.receiver.try_recv().unwrap();
        assert_eq!(first.payload, vec![1]);
        assert_eq!(first.path, HR_MESSAGE_PATH);
        assert_eq!(first.source, *wearable.target());
        assert_eq!(sub.receiver.try_recv().unwrap().payload, vec![2]);
        assert!(sub.receiver.try_recv().is_err());
    }

    #[test]
    fn test_send_without_subscriber_is_lost_not_an_error() {
        let hub = LoopbackHub::new();
        let wearable = hub.join("wearable");
        let handheld = hub.join("handheld");

        assert!(wearable
            .send_to(handheld.target(), HR_MESSAGE_PATH, &[1])
            .is_ok());

        // Subscribing afterwards does not replay the earlier send.
        let sub = handheld.subscribe(HR_MESSAGE_PATH);
        assert!(sub.receiver.try_recv().is_err());
    }

    #[test]
    fn test_send_to_departed_peer_is_unreachable() {
        let hub = LoopbackHub::new();
        let wearable = hub.join("wearable");
        let handheld = hub.join("handheld");

        handheld.leave();
        let err = wearable
            .send_to(handheld.target(), HR_MESSAGE_PATH, &[1])
            .unwrap_err();
        assert!(matches!(err, TransportError::PeerUnreachable(_)));
    }

    #[test]
    fn test_unsubscribe_detaches_queue() {
        let hub = LoopbackHub::new();
        let wearable = hub.join("wearable");
        let handheld = hub.join("handheld");

        let sub = handheld.subscribe(HR_MESSAGE_PATH);
        handheld.unsubscribe(sub.id);

        wearable
            .send_to(handheld.target(), HR_MESSAGE_PATH, &[1])
            .unwrap();
        // Sender side was dropped on unsubscribe, so the queue reports
        // disconnection rather than a message.
        assert!(sub.receiver.recv().is_err());
    }
}
