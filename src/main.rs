//! keyhandler-daemon: dispatches hardware key events to system actions
//!
//! This daemon reads gesture, alert-slider and flip-camera scancodes and
//! provides:
//! - Slider position remapping through live settings
//! - Proximity gating for gestures that may fire in a pocket
//! - Kernel gesture toggles and vibrator strength control
//! - IPC server for status, settings and action notifications

mod config;
mod engine;
mod events;
mod input;
mod ipc;
mod lifecycle;
mod profile;
mod proximity;
mod settings;
mod sysfs;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::engine::DispatchEngine;
use crate::events::{ActionEvent, BroadcastSink};
use crate::input::InputListener;
use crate::ipc::{Server, ServerContext};
use crate::lifecycle::ShutdownSignal;
use crate::proximity::{IioProximitySensor, ProximityGate, ProximitySensor, TokioTimeouts};
use crate::settings::{JsonFileStore, SettingsCache, SettingsStore};
use crate::sysfs::{KernelControl, VibratorStrength};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "keyhandler-daemon starting"
    );

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        profile = %config.profile,
        sysfs_root = ?config.sysfs_root,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::new()?;

    let store: Arc<dyn SettingsStore> = Arc::new(
        JsonFileStore::open(&config.settings_path).context("failed to open settings store")?,
    );
    let profile = Arc::new(config.device_profile());
    let settings = Arc::new(SettingsCache::init(Arc::clone(&store), Arc::clone(&profile)));

    let vibrator_present = sysfs::vibrator_present(&config.sysfs_root);
    let vibrator = VibratorStrength::new(&config.sysfs_root);
    match vibrator.restore(store.as_ref()) {
        Ok(Some(level)) => info!(level, "vibrator strength applied"),
        Ok(None) => info!("vibrator strength control not available"),
        Err(e) => warn!(?e, "failed to restore vibrator strength"),
    }
    if !vibrator_present {
        warn!("no vibrator found, haptic feedback disabled");
    }

    // Input listener, sensor and timers -> engine
    let (engine_tx, engine_rx) = mpsc::channel(64);
    // Engine -> IPC subscribers
    let (action_tx, _action_rx) = broadcast::channel::<ActionEvent>(64);
    let actions = BroadcastSink::new(action_tx);

    let sensor = match &config.proximity_node {
        Some(node) if profile.proximity.supported => {
            match IioProximitySensor::open(node, config.proximity_max_range, engine_tx.clone()) {
                Ok(sensor) => {
                    info!(?node, max_range = config.proximity_max_range, "proximity sensor ready");
                    Some(Box::new(sensor) as Box<dyn ProximitySensor>)
                }
                Err(e) => {
                    warn!(?e, ?node, "proximity sensor unavailable, gestures will not be gated");
                    None
                }
            }
        }
        Some(_) => {
            info!("proximity check on wake disabled for this device");
            None
        }
        None => {
            warn!("no proximity sensor configured, gestures will not be gated");
            None
        }
    };
    let gate = ProximityGate::new(sensor, Box::new(TokioTimeouts::new(engine_tx.clone())));
    let proximity_gate = gate.is_available();

    let mut engine = DispatchEngine::new(
        Arc::clone(&profile),
        Arc::clone(&settings),
        gate,
        Box::new(actions.clone()),
        vibrator_present,
    );

    // Start the input listener (reads the evdev stream on a tokio task)
    let listener = config.input_device.as_ref().map(|device| {
        let listener = Arc::new(InputListener::new(device, engine_tx.clone()));
        match listener.start() {
            Ok(()) => info!(device = ?listener.device(), "input listener started"),
            Err(e) => {
                error!(?e, "failed to start input listener");
                warn!("continuing without device input - keys can still be injected over IPC");
            }
        }
        listener
    });
    if listener.is_none() {
        warn!("no input device configured - keys can only be injected over IPC");
    }

    let context = Arc::new(ServerContext {
        profile: Arc::clone(&profile),
        engine_tx,
        settings,
        actions,
        kernel: KernelControl::new(&config.sysfs_root),
        vibrator,
        vibrator_present,
        proximity_gate,
        listener: listener.clone(),
        started: Instant::now(),
    });
    let server = Server::new(&config.socket_path, context)?;

    info!("daemon initialized, entering main loop");

    // Main event loop
    tokio::select! {
        // Run the dispatch engine (drains input, samples and timeouts)
        _ = engine.run(engine_rx) => {
            info!("dispatch engine exited");
        }

        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Wait for shutdown signal
        _ = shutdown.wait() => {
            info!("shutdown signal received");
        }
    }

    // Cleanup
    info!("shutting down...");

    if let Some(listener) = &listener {
        listener.stop();
    }
    server.shutdown().await;

    info!("keyhandler-daemon stopped");

    Ok(())
}
