//! Pulselink CLI
//!
//! Runs both halves of the relay in one process over the loopback channel:
//! a simulated wearable samples and dispatches, a handheld listener fills
//! the rolling window, and the latest readings are printed as they land.

use anyhow::Context;
use clap::{Parser, Subcommand};
use pulselink::{
    Config, InboundListener, LoopbackHub, RelayDispatcher, RollingWindow, SamplerService,
    SignalHub, SimulatedHeartRateSource, VERSION, WIRE_SCHEMA,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "pulselink")]
#[command(version = VERSION)]
#[command(about = "Two-device heart-rate telemetry relay", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a wearable + handheld pair over the in-process loopback channel
    Run {
        /// Stop after this many seconds (0 = run until Ctrl+C)
        #[arg(long, default_value = "0")]
        duration_secs: u64,

        /// Base heart rate for the simulated sensor
        #[arg(long)]
        bpm: Option<f64>,

        /// Sample rate of the simulated sensor in Hz
        #[arg(long)]
        rate_hz: Option<f64>,
    },

    /// Display the wire-schema declaration
    Schema,

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            duration_secs,
            bpm,
            rate_hz,
        } => cmd_run(duration_secs, bpm, rate_hz),
        Commands::Schema => {
            println!("{WIRE_SCHEMA}");
            Ok(())
        }
        Commands::Config => cmd_config(),
    }
}

fn cmd_run(duration_secs: u64, bpm: Option<f64>, rate_hz: Option<f64>) -> anyhow::Result<()> {
    let mut config = Config::load().unwrap_or_default();
    if let Some(bpm) = bpm {
        config.sim.base_bpm = bpm;
    }
    if let Some(rate_hz) = rate_hz {
        config.sim.sample_rate_hz = rate_hz;
    }

    println!("Pulselink v{VERSION}");
    println!();
    println!("  Simulated sensor: {} bpm base, {} Hz", config.sim.base_bpm, config.sim.sample_rate_hz);
    println!("  Retention horizon: {}s", config.retention_horizon.as_secs());
    println!("  Liveness tick: {}s", config.tick_interval.as_secs());
    println!();
    if duration_secs == 0 {
        println!("Press Ctrl+C to stop");
    } else {
        println!("Running for {duration_secs}s");
    }
    println!();

    // Pair the two roles over an in-process hub. Real deployments put a
    // radio behind the same traits.
    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "local".to_string());
    let hub = LoopbackHub::new();
    let wearable_node = hub.join(&format!("wearable-{host}"));
    let handheld_node = Arc::new(hub.join(&format!("handheld-{host}")));

    let stats = pulselink::create_shared_stats();

    // Handheld side: listener feeding the rolling window.
    let handheld_signals = SignalHub::new();
    let window = Arc::new(Mutex::new(RollingWindow::new(config.retention_horizon)));
    let listener = InboundListener::new(
        Arc::clone(&handheld_node),
        Arc::clone(&window),
        handheld_signals.clone(),
        stats.clone(),
    );
    listener.start_listening();

    // Wearable side: simulated sensor into the relay dispatcher.
    let wearable_signals = SignalHub::new();
    let source = SimulatedHeartRateSource::new(config.sim.base_bpm, config.sim.sample_rate_hz);
    let dispatcher = RelayDispatcher::new(wearable_node, stats.clone());
    let service = SamplerService::new(source, dispatcher, wearable_signals, stats.clone())
        .with_timing(config.tick_interval, config.wake_timeout);
    service
        .start()
        .context("failed to start the sampling service")?;

    // Set up Ctrl+C handler
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    let mut reading_rx = handheld_signals.watch_reading();
    let started = Instant::now();

    while running.load(Ordering::SeqCst) {
        if duration_secs > 0 && started.elapsed() >= Duration::from_secs(duration_secs) {
            break;
        }

        match reading_rx.has_changed() {
            Ok(true) => {
                let reading = *reading_rx.borrow_and_update();
                let clock = chrono::DateTime::from_timestamp_millis(reading.timestamp_millis)
                    .map(|t| t.format("%H:%M:%S").to_string())
                    .unwrap_or_else(|| "--:--:--".to_string());
                let retained = window.lock().expect("window lock poisoned").len();
                println!("[{clock}] {:.1} bpm  (window: {retained} readings)", reading.value);
            }
            Ok(false) => {}
            Err(_) => break,
        }

        thread::sleep(Duration::from_millis(100));
    }

    println!();
    println!("Stopping...");
    service.stop();
    listener.stop_listening();

    println!();
    println!("{}", stats.summary());
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!(
        "{}",
        serde_json::to_string_pretty(&config).unwrap_or_else(|_| "Error".to_string())
    );
    Ok(())
}
