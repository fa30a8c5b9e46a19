//! Sense HAT joystick driver.
//!
//! Reads raw `struct input_event` records from the joystick's evdev node.
//! A record is a `struct timeval` (two native words) followed by a `u16`
//! type, a `u16` code and an `i32` value, all in native byte order.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use hatnode_core::hardware::{HardwareError, InputSource, RawInputEvent};
use tracing::debug;

use crate::sysfs::{DeviceClass, INPUT_CLASS, SysfsDevice};

/// Input device name reported by the Sense HAT joystick driver.
pub const SENSE_HAT_JOYSTICK: &str = "Raspberry Pi Sense HAT Joystick";

const WORD: usize = size_of::<usize>();
const TIMEVAL_SIZE: usize = 2 * WORD;
const BODY_SIZE: usize = 8;
/// Size of one `input_event` record on this platform.
pub const EVENT_SIZE: usize = TIMEVAL_SIZE + BODY_SIZE;

const ENODEV: i32 = 19;

/// Decode the type/code/value part of a record.
pub const fn decode(body: [u8; BODY_SIZE]) -> RawInputEvent {
    let [t0, t1, c0, c1, v0, v1, v2, v3] = body;
    RawInputEvent {
        event_type: u16::from_ne_bytes([t0, t1]),
        code: u16::from_ne_bytes([c0, c1]),
        value: i32::from_ne_bytes([v0, v1, v2, v3]),
    }
}

/// Encode `event` as a full record with a zero timestamp.
pub fn encode(event: &RawInputEvent) -> Vec<u8> {
    let mut record = vec![0; TIMEVAL_SIZE];
    record.extend_from_slice(&event.event_type.to_ne_bytes());
    record.extend_from_slice(&event.code.to_ne_bytes());
    record.extend_from_slice(&event.value.to_ne_bytes());
    record
}

/// Input devices listed under `/sys/class/input`.
pub fn list_input_devices() -> Result<Vec<SysfsDevice>, HardwareError> {
    DeviceClass::input(Path::new(INPUT_CLASS)).list()
}

/// The joystick's evdev node.
#[derive(Debug)]
pub struct EvdevJoystick {
    path: PathBuf,
    file: File,
}

impl EvdevJoystick {
    /// Find the input device named `name` and open its `/dev/input` node.
    pub fn open(name: &str) -> Result<Self, HardwareError> {
        Self::open_in(Path::new(INPUT_CLASS), Path::new("/dev/input"), name)
    }

    /// Like [`open`](Self::open), with explicit sysfs and device
    /// directories.
    pub fn open_in(class_dir: &Path, dev_dir: &Path, name: &str) -> Result<Self, HardwareError> {
        let path = DeviceClass::input(class_dir).device_path(dev_dir, name)?;
        Self::open_path(&path)
    }

    /// Open an evdev node directly.
    pub fn open_path(path: &Path) -> Result<Self, HardwareError> {
        let file = File::open(path).map_err(|source| HardwareError::Io {
            context: "opening input device",
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Joystick device opened");
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    /// The device node in use.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl InputSource for EvdevJoystick {
    fn next_event(&mut self) -> Result<Option<RawInputEvent>, HardwareError> {
        let mut record = [0_u8; EVENT_SIZE];
        match self.file.read_exact(&mut record) {
            Ok(()) => {
                let body = record.last_chunk::<BODY_SIZE>().copied().unwrap_or_default();
                Ok(Some(decode(body)))
            }
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            // The device was unplugged or its driver unbound.
            Err(e) if e.raw_os_error() == Some(ENODEV) => Ok(None),
            Err(source) => Err(HardwareError::Io {
                context: "reading input event",
                path: self.path.clone(),
                source,
            }),
        }
    }
}
