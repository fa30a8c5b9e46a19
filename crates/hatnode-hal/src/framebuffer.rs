//! Sense HAT LED matrix driver.
//!
//! The matrix is exposed by the `rpisense-fb` driver as an 8x8 framebuffer
//! of RGB565 pixels. Filling it with one color is a single 128-byte write at
//! offset zero.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use hatnode_core::hardware::{HardwareError, Indicator};
use hatnode_core::value::Rgb;
use tracing::debug;

use crate::sysfs::{DeviceClass, GRAPHICS_CLASS};

/// Pixels in the matrix.
pub const PIXELS: usize = 64;

/// Framebuffer name reported by the Sense HAT driver.
pub const SENSE_HAT_FB: &str = "RPi-Sense FB";

/// Pack a color into RGB565.
#[allow(clippy::arithmetic_side_effects)]
pub fn rgb565(color: Rgb) -> u16 {
    // Constant shifts of 5/6/5-bit fields never exceed 16 bits.
    (u16::from(color.r >> 3) << 11) | (u16::from(color.g >> 2) << 5) | u16::from(color.b >> 3)
}

/// One full frame of `color`, in native byte order.
pub fn solid_frame(color: Rgb) -> Vec<u8> {
    let pixel = rgb565(color).to_ne_bytes();
    pixel.repeat(PIXELS)
}

/// The LED matrix framebuffer.
#[derive(Debug)]
pub struct SenseHatLed {
    path: PathBuf,
    file: File,
}

impl SenseHatLed {
    /// Find the framebuffer named `name` under `/sys/class/graphics` and open
    /// it under `/dev`.
    pub fn open(name: &str) -> Result<Self, HardwareError> {
        Self::open_in(Path::new(GRAPHICS_CLASS), Path::new("/dev"), name)
    }

    /// Like [`open`](Self::open), with explicit sysfs and device
    /// directories.
    pub fn open_in(class_dir: &Path, dev_dir: &Path, name: &str) -> Result<Self, HardwareError> {
        let path = DeviceClass::graphics(class_dir).device_path(dev_dir, name)?;
        Self::open_path(&path)
    }

    /// Open a framebuffer device node directly.
    pub fn open_path(path: &Path) -> Result<Self, HardwareError> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| HardwareError::Io {
                context: "opening framebuffer",
                path: path.to_path_buf(),
                source,
            })?;
        debug!(path = %path.display(), "LED framebuffer opened");
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

impl Indicator for SenseHatLed {
    fn set(&mut self, color: Rgb) -> Result<(), HardwareError> {
        let frame = solid_frame(color);
        self.file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.write_all(&frame))
            .and_then(|()| self.file.flush())
            .map_err(|source| HardwareError::Io {
                context: "writing framebuffer",
                path: self.path.clone(),
                source,
            })
    }
}
