//! Inbound listener: channel subscription on the handheld side.
//!
//! Active only while the owning display context is in the foreground;
//! whoever owns that transition calls `start_listening`/`stop_listening`.
//! Malformed payloads are logged and dropped here; they never reach the
//! window and never take the listener down.

use crate::signals::SignalHub;
use crate::stats::SharedSessionStats;
use crate::transport::{InboundMessage, MessageSubscriber, SubscriptionId};
use crate::window::RollingWindow;
use crate::wire::{decode, HR_MESSAGE_PATH};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

struct ActiveSubscription {
    id: SubscriptionId,
    drain: JoinHandle<()>,
}

/// Decodes channel payloads into the rolling window.
pub struct InboundListener<C: MessageSubscriber + 'static> {
    channel: Arc<C>,
    window: Arc<Mutex<RollingWindow>>,
    signals: SignalHub,
    stats: SharedSessionStats,
    active: Mutex<Option<ActiveSubscription>>,
}

impl<C: MessageSubscriber + 'static> InboundListener<C> {
    pub fn new(
        channel: Arc<C>,
        window: Arc<Mutex<RollingWindow>>,
        signals: SignalHub,
        stats: SharedSessionStats,
    ) -> Self {
        Self {
            channel,
            window,
            signals,
            stats,
            active: Mutex::new(None),
        }
    }

    /// Subscribe to the heart-rate path and start draining messages.
    ///
    /// Guarded against double registration: a second call while already
    /// listening is a logged no-op.
    pub fn start_listening(&self) {
        let mut active = self.active.lock().expect("listener state lock poisoned");
        if active.is_some() {
            debug!("start_listening ignored, already subscribed");
            return;
        }

        let subscription = self.channel.subscribe(HR_MESSAGE_PATH);
        let window = Arc::clone(&self.window);
        let signals = self.signals.clone();
        let stats = Arc::clone(&self.stats);

        let receiver = subscription.receiver;
        let drain = thread::spawn(move || {
            // Runs until unsubscribe drops the sending side.
            for message in receiver.iter() {
                handle_message(message, &window, &signals, &stats);
            }
        });

        *active = Some(ActiveSubscription {
            id: subscription.id,
            drain,
        });
        debug!(path = HR_MESSAGE_PATH, "listening");
    }

    /// Unsubscribe and wait for the drain thread to finish. Idempotent;
    /// also the permanent-teardown path.
    pub fn stop_listening(&self) {
        let taken = self.active.lock().expect("listener state lock poisoned").take();
        if let Some(active) = taken {
            self.channel.unsubscribe(active.id);
            let _ = active.drain.join();
            debug!("stopped listening");
        }
    }

    /// True while subscribed to the channel.
    pub fn is_listening(&self) -> bool {
        self.active
            .lock()
            .expect("listener state lock poisoned")
            .is_some()
    }

    /// The window this listener feeds, for the display layer to read.
    pub fn window(&self) -> Arc<Mutex<RollingWindow>> {
        Arc::clone(&self.window)
    }
}

impl<C: MessageSubscriber + 'static> Drop for InboundListener<C> {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

fn handle_message(
    message: InboundMessage,
    window: &Mutex<RollingWindow>,
    signals: &SignalHub,
    stats: &SharedSessionStats,
) {
    stats.record_message_received();

    // The subscription is path-scoped already; re-check anyway so a
    // misbehaving channel cannot feed foreign payloads into the window.
    if message.path != HR_MESSAGE_PATH {
        debug!(path = %message.path, "ignoring message on unexpected path");
        return;
    }

    match decode(&message.payload) {
        Ok(reading) => {
            let evicted = window
                .lock()
                .expect("rolling window lock poisoned")
                .append(reading);
            stats.record_evictions(evicted as u64);
            signals.publish_reading(reading);
            debug!(
                source = %message.source,
                value = reading.value,
                "reading received"
            );
        }
        Err(e) => {
            stats.record_decode_failure();
            warn!(source = %message.source, error = %e, "dropping undecodable payload");
        }
    }
}
