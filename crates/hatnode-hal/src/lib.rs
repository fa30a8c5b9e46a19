//! Hardware drivers for the hatnode device server.
//!
//! # Modules
//!
//! - [`sysfs`] -- Finding devices by name under `/sys/class`.
//! - [`framebuffer`] -- The Sense HAT LED matrix as an [`Indicator`].
//! - [`evdev`] -- The Sense HAT joystick as an [`InputSource`].
//! - [`simulated`] -- In-process fakes for both, used without a board and in
//!   tests.
//! - [`poller`] -- The joystick read loop and its debounced switch machine.
//!
//! [`Indicator`]: hatnode_core::hardware::Indicator
//! [`InputSource`]: hatnode_core::hardware::InputSource

pub mod evdev;
pub mod framebuffer;
pub mod poller;
pub mod simulated;
pub mod sysfs;

pub use evdev::EvdevJoystick;
pub use framebuffer::SenseHatLed;
pub use poller::{HardwarePoller, PollerExit, PollerHandle, SwitchMachine};
pub use simulated::{ChannelInput, InputSender, ScriptedInput, SimulatedIndicator};
