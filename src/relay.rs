//! Relay dispatcher: pushes each reading to every reachable peer.
//!
//! Delivery is fire-and-forget by design. The display on the other side
//! only cares about the live value, so a missed reading has no catch-up
//! value: no acknowledgements, no retries, no buffering for unreachable
//! peers.

use crate::stats::SharedSessionStats;
use crate::transport::PeerLink;
use crate::wire::{encode, Reading, HR_MESSAGE_PATH};
use tracing::{debug, trace, warn};

/// Encodes readings and fans them out over a [`PeerLink`].
pub struct RelayDispatcher<L: PeerLink> {
    link: L,
    stats: SharedSessionStats,
}

impl<L: PeerLink> RelayDispatcher<L> {
    pub fn new(link: L, stats: SharedSessionStats) -> Self {
        Self { link, stats }
    }

    /// Encode the reading once and attempt one independent send per
    /// currently reachable peer, in iteration order.
    ///
    /// Never fails: a send error for one peer is logged and does not affect
    /// the others; with no reachable peers the reading is dropped.
    pub fn dispatch(&self, reading: &Reading) {
        self.stats.record_dispatch();
        let payload = encode(reading);
        debug!(
            bytes = payload.len(),
            payload = %hex_string(&payload),
            "encoded reading"
        );

        // Reachability changes outside this crate, so the peer set is
        // queried fresh on every dispatch.
        let peers = self.link.reachable_peers();
        if peers.is_empty() {
            trace!(value = reading.value, "no reachable peers, dropping reading");
            return;
        }

        for peer in peers {
            match self.link.send_to(&peer, HR_MESSAGE_PATH, &payload) {
                Ok(()) => {
                    debug!(peer = %peer, value = reading.value, "sent reading");
                }
                Err(e) => {
                    self.stats.record_send_failed();
                    warn!(peer = %peer, error = %e, "send failed, reading dropped for this peer");
                }
            }
        }
    }

    /// Borrow the underlying link.
    pub fn link(&self) -> &L {
        &self.link
    }
}

fn hex_string(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::create_shared_stats;
    use crate::transport::{PeerTarget, TransportError};
    use crate::wire::{decode, RECORD_LEN};
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// Link stub that records every send and can fail selected peers.
    struct RecordingLink {
        peers: Mutex<Vec<PeerTarget>>,
        failing: HashSet<String>,
        sent: Mutex<Vec<(PeerTarget, String, Vec<u8>)>>,
    }

    impl RecordingLink {
        fn new(peer_ids: &[&str]) -> Self {
            Self {
                peers: Mutex::new(peer_ids.iter().map(|id| PeerTarget::new(*id)).collect()),
                failing: HashSet::new(),
                sent: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, peer_id: &str) -> Self {
            self.failing.insert(peer_id.to_string());
            self
        }
    }

    impl PeerLink for RecordingLink {
        fn reachable_peers(&self) -> Vec<PeerTarget> {
            self.peers.lock().unwrap().clone()
        }

        fn send_to(
            &self,
            peer: &PeerTarget,
            path: &str,
            payload: &[u8],
        ) -> Result<(), TransportError> {
            if self.failing.contains(&peer.id) {
                return Err(TransportError::Closed("simulated radio failure".into()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((peer.clone(), path.to_string(), payload.to_vec()));
            Ok(())
        }
    }

    #[test]
    fn test_fan_out_reaches_every_peer() {
        let dispatcher =
            RelayDispatcher::new(RecordingLink::new(&["a", "b"]), create_shared_stats());
        let reading = Reading::at(72.0, 1_700_000_000_000);

        dispatcher.dispatch(&reading);

        let sent = dispatcher.link().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 2);
        for (_, path, payload) in &sent {
            assert_eq!(path, HR_MESSAGE_PATH);
            assert_eq!(payload.len(), RECORD_LEN);
            assert_eq!(decode(payload).unwrap(), reading);
        }
        // Encoded exactly once: both peers got byte-identical payloads.
        assert_eq!(sent[0].2, sent[1].2);
    }

    #[test]
    fn test_one_failing_peer_does_not_block_the_other() {
        let stats = create_shared_stats();
        let link = RecordingLink::new(&["a", "b"]).failing("a");
        let dispatcher = RelayDispatcher::new(link, stats.clone());

        // Must not panic or surface the failure.
        dispatcher.dispatch(&Reading::at(72.0, 1_700_000_000_000));

        let sent = dispatcher.link().sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, PeerTarget::new("b"));
        assert_eq!(stats.snapshot().sends_failed, 1);
    }

    #[test]
    fn test_empty_peer_set_is_a_no_op() {
        let stats = create_shared_stats();
        let dispatcher = RelayDispatcher::new(RecordingLink::new(&[]), stats.clone());

        dispatcher.dispatch(&Reading::at(72.0, 1_700_000_000_000));

        assert!(dispatcher.link().sent.lock().unwrap().is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.dispatches, 1);
        assert_eq!(snapshot.sends_failed, 0);
    }

    #[test]
    fn test_peer_set_is_queried_fresh_each_dispatch() {
        let dispatcher = RelayDispatcher::new(RecordingLink::new(&[]), create_shared_stats());
        dispatcher.dispatch(&Reading::at(70.0, 1));
        assert!(dispatcher.link().sent.lock().unwrap().is_empty());

        dispatcher
            .link()
            .peers
            .lock()
            .unwrap()
            .push(PeerTarget::new("late-joiner"));
        dispatcher.dispatch(&Reading::at(71.0, 2));
        assert_eq!(dispatcher.link().sent.lock().unwrap().len(), 1);
    }
}
