//! Hardware abstraction traits.
//!
//! The core never talks to a device directly. Drivers implement
//! [`Indicator`] (something that can show a color) and [`InputSource`]
//! (a blocking stream of raw input events); `hatnode-hal` provides the
//! Sense HAT and simulated implementations.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::warn;

use crate::value::Rgb;

/// Linux `EV_SYN` event type.
pub const EV_SYN: u16 = 0x00;
/// Linux `EV_KEY` event type.
pub const EV_KEY: u16 = 0x01;

/// Errors raised by hardware drivers.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// No device with the requested name is present.
    #[error("device not found: {name}")]
    DeviceNotFound {
        /// The device name that was searched for.
        name: String,
    },

    /// An I/O operation against a device node failed.
    #[error("{context} ({path}): {source}")]
    Io {
        /// What was being attempted.
        context: &'static str,
        /// The device node or sysfs path involved.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// A raw event as delivered by an input device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInputEvent {
    /// Event type (`EV_KEY`, `EV_SYN`, ...).
    pub event_type: u16,
    /// Event code (which key or axis).
    pub code: u16,
    /// Event value (for keys: 0 released, 1 pressed, 2 held).
    pub value: i32,
}

/// What a key event says about its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    /// The key went up.
    Released,
    /// The key went down.
    Pressed,
    /// Auto-repeat while the key is held.
    Held,
}

impl RawInputEvent {
    /// Build a key event.
    pub const fn key(code: u16, action: KeyAction) -> Self {
        let value = match action {
            KeyAction::Released => 0,
            KeyAction::Pressed => 1,
            KeyAction::Held => 2,
        };
        Self {
            event_type: EV_KEY,
            code,
            value,
        }
    }

    /// Build a synchronization event.
    pub const fn sync() -> Self {
        Self {
            event_type: EV_SYN,
            code: 0,
            value: 0,
        }
    }

    /// The key action, or `None` if this is not a key event.
    pub const fn key_action(&self) -> Option<KeyAction> {
        if self.event_type != EV_KEY {
            return None;
        }
        match self.value {
            0 => Some(KeyAction::Released),
            1 => Some(KeyAction::Pressed),
            2 => Some(KeyAction::Held),
            _ => None,
        }
    }
}

/// A device that can display a solid color.
pub trait Indicator: Send {
    /// Fill the indicator with `color`.
    fn set(&mut self, color: Rgb) -> Result<(), HardwareError>;

    /// Turn the indicator off.
    fn clear(&mut self) -> Result<(), HardwareError> {
        self.set(Rgb::OFF)
    }
}

/// A blocking source of raw input events.
pub trait InputSource: Send {
    /// Block until the next event arrives.
    ///
    /// Returns `Ok(None)` once the device is gone for good. Errors are
    /// treated as transient by the poller.
    fn next_event(&mut self) -> Result<Option<RawInputEvent>, HardwareError>;
}

impl<T: InputSource + ?Sized> InputSource for Box<T> {
    fn next_event(&mut self) -> Result<Option<RawInputEvent>, HardwareError> {
        (**self).next_event()
    }
}

/// Shared handle to the single indicator device.
///
/// The dispatcher task and the poller thread both drive the same display;
/// writes are short and serialized behind a mutex.
#[derive(Clone)]
pub struct IndicatorHandle {
    inner: Arc<Mutex<Box<dyn Indicator>>>,
}

impl IndicatorHandle {
    /// Take ownership of an indicator device.
    pub fn new(indicator: impl Indicator + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Box::new(indicator))),
        }
    }

    /// Fill the indicator with `color`.
    pub fn set(&self, color: Rgb) -> Result<(), HardwareError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set(color)
    }

    /// Turn the indicator off.
    pub fn clear(&self) -> Result<(), HardwareError> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear()
    }

    /// Set `color`, logging instead of failing.
    pub fn show(&self, color: Rgb) {
        if let Err(e) = self.set(color) {
            warn!(error = %e, ?color, "Indicator update failed");
        }
    }

    /// Clear the indicator, logging instead of failing.
    pub fn blank(&self) {
        if let Err(e) = self.clear() {
            warn!(error = %e, "Indicator clear failed");
        }
    }
}

impl std::fmt::Debug for IndicatorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorHandle").finish_non_exhaustive()
    }
}
