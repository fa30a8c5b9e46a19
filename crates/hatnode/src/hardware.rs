//! Backend selection.

use hatnode_core::config::{HardwareBackend, HardwareConfig};
use hatnode_core::hardware::{HardwareError, IndicatorHandle, InputSource};
use hatnode_hal::evdev::{self, EvdevJoystick};
use hatnode_hal::simulated::{InputSender, SimulatedIndicator, channel_input};
use hatnode_hal::SenseHatLed;
use tracing::{info, warn};

/// Opened devices for one backend.
pub struct Hardware {
    /// The LED display.
    pub indicator: IndicatorHandle,
    /// The joystick event stream.
    pub input: Box<dyn InputSource>,
    /// Keeps the simulated input open; dropping it ends the stream.
    pub feeder: Option<InputSender>,
}

/// Open the devices named by `config`.
pub fn open(config: &HardwareConfig) -> Result<Hardware, HardwareError> {
    match config.backend {
        HardwareBackend::SenseHat => open_sense_hat(config),
        HardwareBackend::Simulated => {
            let (feeder, input) = channel_input();
            info!("Using simulated hardware");
            Ok(Hardware {
                indicator: IndicatorHandle::new(SimulatedIndicator::new()),
                input: Box::new(input),
                feeder: Some(feeder),
            })
        }
    }
}

fn open_sense_hat(config: &HardwareConfig) -> Result<Hardware, HardwareError> {
    let led = SenseHatLed::open(&config.framebuffer)?;
    let joystick = EvdevJoystick::open(&config.joystick_device).inspect_err(|e| {
        warn!(error = %e, "Joystick not found");
        if let Ok(devices) = evdev::list_input_devices() {
            for device in devices {
                warn!(node = device.node, name = device.name, "Available input device");
            }
        }
    })?;
    info!(
        led = %led.path().display(),
        joystick = %joystick.path().display(),
        "Sense HAT opened"
    );
    Ok(Hardware {
        indicator: IndicatorHandle::new(led),
        input: Box::new(joystick),
        feeder: None,
    })
}
