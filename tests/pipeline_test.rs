//! End-to-end tests: simulated wearable to handheld window over loopback.

use pulselink::{
    create_shared_stats, InboundListener, LoopbackHub, RelayDispatcher, RollingWindow,
    SamplerService, SignalHub, SimulatedHeartRateSource,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

const TEST_TICK: Duration = Duration::from_millis(10);
const TEST_WAKE: Duration = Duration::from_millis(200);

fn wait_for<F: Fn() -> bool>(what: &str, cond: F) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cond() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        thread::sleep(Duration::from_millis(10));
    }
}

struct Pair {
    service: SamplerService<SimulatedHeartRateSource, pulselink::LoopbackNode>,
    listener: InboundListener<pulselink::LoopbackNode>,
    window: Arc<Mutex<RollingWindow>>,
    wearable_signals: SignalHub,
    handheld_signals: SignalHub,
    stats: pulselink::SharedSessionStats,
}

fn paired_devices() -> Pair {
    let hub = LoopbackHub::new();
    let wearable_node = hub.join("wearable");
    let handheld_node = Arc::new(hub.join("handheld"));

    let stats = create_shared_stats();
    let handheld_signals = SignalHub::new();
    let window = Arc::new(Mutex::new(RollingWindow::default()));
    let listener = InboundListener::new(
        Arc::clone(&handheld_node),
        Arc::clone(&window),
        handheld_signals.clone(),
        stats.clone(),
    );

    let wearable_signals = SignalHub::new();
    let source = SimulatedHeartRateSource::new(72.0, 100.0);
    let dispatcher = RelayDispatcher::new(wearable_node, stats.clone());
    let service = SamplerService::new(source, dispatcher, wearable_signals.clone(), stats.clone())
        .with_timing(TEST_TICK, TEST_WAKE);

    Pair {
        service,
        listener,
        window,
        wearable_signals,
        handheld_signals,
        stats,
    }
}

#[test]
fn test_readings_flow_end_to_end_in_order() {
    let pair = paired_devices();
    pair.listener.start_listening();
    pair.service.start().unwrap();

    wait_for("five readings in the window", || {
        pair.window.lock().unwrap().len() >= 5
    });

    // Quiesce before comparing cell and window so no reading lands between
    // the two observations.
    pair.service.stop();
    thread::sleep(Duration::from_millis(100));

    let snapshot = pair.window.lock().unwrap().snapshot();
    for pairwise in snapshot.windows(2) {
        assert!(
            pairwise[0].timestamp_millis <= pairwise[1].timestamp_millis,
            "window out of order: {pairwise:?}"
        );
    }
    for reading in &snapshot {
        assert!(reading.value > 0.0);
    }

    // The handheld's latest-reading cell tracks the window's tail.
    assert_eq!(
        pair.handheld_signals.latest_reading(),
        pair.window.lock().unwrap().latest()
    );

    pair.listener.stop_listening();

    // Nothing flows once both ends are down.
    let settled = pair.stats.snapshot().messages_received;
    thread::sleep(Duration::from_millis(100));
    assert_eq!(pair.stats.snapshot().messages_received, settled);
}

#[test]
fn test_run_state_cell_tracks_lifecycle() {
    let pair = paired_devices();
    assert!(!pair.wearable_signals.is_running());

    pair.service.start().unwrap();
    wait_for("run-state true", || pair.wearable_signals.is_running());

    pair.service.stop();
    assert!(!pair.wearable_signals.is_running());
}

#[test]
fn test_background_listener_misses_readings_without_catchup() {
    let pair = paired_devices();
    pair.service.start().unwrap();

    // Listener still backgrounded: everything dispatched so far is lost.
    wait_for("dispatches without listener", || {
        pair.stats.snapshot().dispatches >= 3
    });
    assert_eq!(pair.window.lock().unwrap().len(), 0);

    // Foregrounding starts from live data only.
    pair.listener.start_listening();
    wait_for("live readings after foregrounding", || {
        pair.window.lock().unwrap().len() >= 2
    });

    let first_received = pair.window.lock().unwrap().snapshot()[0];
    assert!(
        first_received.timestamp_millis > 0,
        "expected a live reading, got the sentinel"
    );

    pair.service.stop();
    pair.listener.stop_listening();
}

#[test]
fn test_no_peers_then_pairing() {
    // A wearable alone on the hub dispatches into the void without error.
    let hub = LoopbackHub::new();
    let wearable_node = hub.join("wearable");

    let stats = create_shared_stats();
    let signals = SignalHub::new();
    let source = SimulatedHeartRateSource::new(72.0, 100.0);
    let dispatcher = RelayDispatcher::new(wearable_node, stats.clone());
    let service = SamplerService::new(source, dispatcher, signals, stats.clone())
        .with_timing(TEST_TICK, TEST_WAKE);

    service.start().unwrap();
    wait_for("dispatches with no peers", || {
        stats.snapshot().dispatches >= 3
    });
    assert_eq!(stats.snapshot().sends_failed, 0);

    // A handheld joining mid-session starts receiving without any replay.
    let handheld_node = Arc::new(hub.join("handheld"));
    let window = Arc::new(Mutex::new(RollingWindow::default()));
    let listener = InboundListener::new(
        Arc::clone(&handheld_node),
        Arc::clone(&window),
        SignalHub::new(),
        stats.clone(),
    );
    listener.start_listening();

    wait_for("readings after late pairing", || {
        window.lock().unwrap().len() >= 2
    });

    service.stop();
    listener.stop_listening();
}
