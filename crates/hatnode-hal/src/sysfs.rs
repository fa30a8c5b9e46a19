//! Device discovery through sysfs class directories.
//!
//! Both Sense HAT devices are found by name: the joystick under
//! `/sys/class/input/eventN/device/name`, the LED matrix under
//! `/sys/class/graphics/fbN/name`. The matching node name (`event3`, `fb1`)
//! is then opened under `/dev`.

use std::fs;
use std::path::{Path, PathBuf};

use hatnode_core::hardware::HardwareError;

/// Where input devices are listed.
pub const INPUT_CLASS: &str = "/sys/class/input";
/// Where framebuffers are listed.
pub const GRAPHICS_CLASS: &str = "/sys/class/graphics";

/// A device listed under a sysfs class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SysfsDevice {
    /// Node name, e.g. `event3`.
    pub node: String,
    /// The name the driver reports.
    pub name: String,
}

/// A sysfs class and how its entries report their names.
#[derive(Debug, Clone, Copy)]
pub struct DeviceClass<'a> {
    /// The class directory.
    pub dir: &'a Path,
    /// Only entries starting with this are considered.
    pub prefix: &'a str,
    /// Path of the name file relative to an entry.
    pub name_file: &'a str,
}

impl<'a> DeviceClass<'a> {
    /// Input event devices under `dir`.
    pub const fn input(dir: &'a Path) -> Self {
        Self {
            dir,
            prefix: "event",
            name_file: "device/name",
        }
    }

    /// Framebuffers under `dir`.
    pub const fn graphics(dir: &'a Path) -> Self {
        Self {
            dir,
            prefix: "fb",
            name_file: "name",
        }
    }

    /// Every entry with a readable name, sorted by node.
    ///
    /// Entries without a name file are skipped.
    pub fn list(&self) -> Result<Vec<SysfsDevice>, HardwareError> {
        let entries = fs::read_dir(self.dir).map_err(|source| HardwareError::Io {
            context: "listing sysfs class",
            path: self.dir.to_path_buf(),
            source,
        })?;

        let mut devices: Vec<SysfsDevice> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let node = entry.file_name().into_string().ok()?;
                if !node.starts_with(self.prefix) {
                    return None;
                }
                let name = fs::read_to_string(entry.path().join(self.name_file)).ok()?;
                Some(SysfsDevice {
                    node,
                    name: name.trim().to_owned(),
                })
            })
            .collect();
        devices.sort_by(|a, b| a.node.cmp(&b.node));
        Ok(devices)
    }

    /// The first entry whose name equals `name`.
    pub fn find(&self, name: &str) -> Result<SysfsDevice, HardwareError> {
        self.list()?
            .into_iter()
            .find(|device| device.name == name)
            .ok_or_else(|| HardwareError::DeviceNotFound {
                name: name.to_owned(),
            })
    }

    /// Resolve `name` to its device node under `dev_dir`.
    pub fn device_path(&self, dev_dir: &Path, name: &str) -> Result<PathBuf, HardwareError> {
        let device = self.find(name)?;
        Ok(dev_dir.join(device.node))
    }
}
