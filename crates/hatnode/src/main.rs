//! Sense HAT device server.
//!
//! Exposes the LED matrix color and the joystick position as resources,
//! with resource discovery and observe streams.
//!
//! # Startup Sequence
//!
//! 1. Initialize structured logging (tracing)
//! 2. Load configuration from `hatnode-config.yaml`
//! 3. Open the configured hardware backend and show the initial color
//! 4. Build resource state, the resource tree and the dispatcher task
//! 5. Spawn the joystick poller thread
//! 6. Serve HTTP until Ctrl-C
//! 7. Stop the poller and the dispatcher

mod error;
mod hardware;

use std::path::Path;
use std::sync::Arc;

use hatnode_core::config::HatnodeConfig;
use hatnode_core::dispatcher::ResourceDispatcher;
use hatnode_core::health::PollerHealth;
use hatnode_core::service::DispatcherService;
use hatnode_core::state::{ResourceId, ResourceState, change_feed};
use hatnode_core::tree::ResourceTree;
use hatnode_hal::HardwarePoller;
use hatnode_server::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, hardware, or the server fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    info!("hatnode starting");

    // 2. Load configuration.
    let config = load_config()?;
    info!(
        host = config.server.host,
        port = config.server.port,
        backend = ?config.hardware.backend,
        debounce_ms = config.joystick.debounce_ms,
        "Configuration loaded"
    );

    // 3. Open hardware.
    let devices = hardware::open(&config.hardware).map_err(AppError::from)?;
    devices.indicator.show(config.led.initial_color.rgb());

    // 4. Resource state and dispatcher.
    let (notifier, feed) = change_feed();
    let led = Arc::new(ResourceState::new(
        ResourceId::Led,
        config.led.initial_color,
        notifier.clone(),
    ));
    let joystick = Arc::new(ResourceState::new(
        ResourceId::Joystick,
        config.joystick.initial_position,
        notifier,
    ));
    let health = Arc::new(PollerHealth::new());

    let dispatcher = ResourceDispatcher::new(
        ResourceTree::standard(),
        led,
        Arc::clone(&joystick),
        devices.indicator.clone(),
        Arc::clone(&health),
    );
    let (service, handle) =
        DispatcherService::new(dispatcher, feed, config.dispatcher.queue_capacity);
    let dispatcher_task = tokio::spawn(service.run());

    // 5. Joystick poller.
    let poller = HardwarePoller::new(
        devices.input,
        joystick,
        devices.indicator,
        health,
        config.joystick.debounce(),
    )
    .spawn()
    .map_err(|source| AppError::Poller { source })?;

    // 6. Serve until Ctrl-C.
    let served = hatnode_server::start_server(&config.server, Arc::new(AppState::new(handle))).await;

    // 7. Shut down.
    poller.request_stop();
    drop(devices.feeder);
    if poller.is_finished() {
        let exit = poller.join();
        info!(?exit, "Joystick poller joined");
    } else {
        info!("Joystick poller is blocked in a read, leaving it to process exit");
    }
    dispatcher_task.abort();

    served.map_err(AppError::from)?;
    info!("hatnode stopped");
    Ok(())
}

/// Load configuration from `hatnode-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
/// Environment overrides apply whether or not the file exists.
fn load_config() -> Result<HatnodeConfig, AppError> {
    let config_path = Path::new("hatnode-config.yaml");
    if config_path.exists() {
        let config = HatnodeConfig::from_file(config_path)?;
        Ok(config)
    } else {
        info!("Config file not found, using defaults");
        let mut config = HatnodeConfig::default();
        config.apply_env_overrides()?;
        Ok(config)
    }
}
