//! Sense HAT drivers against a fake sysfs and device tree.

#![allow(
    clippy::unwrap_used,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects
)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hatnode_core::hardware::{HardwareError, IndicatorHandle, InputSource, KeyAction, RawInputEvent};
use hatnode_core::health::{PollerHealth, PollerStatus};
use hatnode_core::state::{ResourceId, ResourceState, change_feed};
use hatnode_core::value::{LedColor, SwitchPosition};
use hatnode_hal::evdev::{self, SENSE_HAT_JOYSTICK};
use hatnode_hal::framebuffer::{PIXELS, SENSE_HAT_FB};
use hatnode_hal::{EvdevJoystick, HardwarePoller, PollerExit, SenseHatLed, SimulatedIndicator};
use tempfile::TempDir;

struct FakeBoard {
    root: TempDir,
}

impl FakeBoard {
    fn new() -> Self {
        let board = Self {
            root: tempfile::tempdir().unwrap(),
        };
        fs::create_dir_all(board.dev()).unwrap();
        board.add_input("event0", "gpio_keys");
        board.add_framebuffer("fb0", "vc4drmfb");
        board
    }

    fn input_class(&self) -> std::path::PathBuf {
        self.root.path().join("sys/class/input")
    }

    fn graphics_class(&self) -> std::path::PathBuf {
        self.root.path().join("sys/class/graphics")
    }

    fn dev(&self) -> std::path::PathBuf {
        self.root.path().join("dev")
    }

    fn add_input(&self, node: &str, name: &str) {
        let dir = self.input_class().join(node).join("device");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{name}\n")).unwrap();
    }

    fn add_framebuffer(&self, node: &str, name: &str) {
        let dir = self.graphics_class().join(node);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("name"), format!("{name}\n")).unwrap();
        fs::write(self.dev().join(node), b"").unwrap();
    }

    fn write_events(&self, node: &str, events: &[RawInputEvent]) {
        let bytes: Vec<u8> = events.iter().flat_map(evdev::encode).collect();
        fs::write(self.dev().join(node), bytes).unwrap();
    }
}

fn read_frame(path: &Path) -> Vec<u16> {
    fs::read(path)
        .unwrap()
        .chunks_exact(2)
        .map(|p| u16::from_ne_bytes([p[0], p[1]]))
        .collect()
}

#[test]
fn led_fills_the_sense_hat_framebuffer() {
    let board = FakeBoard::new();
    board.add_framebuffer("fb1", SENSE_HAT_FB);

    let led = SenseHatLed::open_in(&board.graphics_class(), &board.dev(), SENSE_HAT_FB).unwrap();
    assert_eq!(led.path(), board.dev().join("fb1"));

    let handle = IndicatorHandle::new(led);
    handle.set(LedColor::Orange.rgb()).unwrap();
    handle.set(LedColor::Red.rgb()).unwrap();

    let frame = read_frame(&board.dev().join("fb1"));
    assert_eq!(frame.len(), PIXELS);
    assert!(frame.iter().all(|&p| p == 0xF800));

    handle.clear().unwrap();
    assert!(read_frame(&board.dev().join("fb1")).iter().all(|&p| p == 0));
    // The other framebuffer is untouched.
    assert!(fs::read(board.dev().join("fb0")).unwrap().is_empty());
}

#[test]
fn missing_framebuffer_is_reported() {
    let board = FakeBoard::new();
    let result = SenseHatLed::open_in(&board.graphics_class(), &board.dev(), SENSE_HAT_FB);
    assert!(matches!(result, Err(HardwareError::DeviceNotFound { .. })));
}

#[test]
fn joystick_reads_records_until_end_of_stream() {
    let board = FakeBoard::new();
    board.add_input("event3", SENSE_HAT_JOYSTICK);
    let events = [
        RawInputEvent::key(28, KeyAction::Pressed),
        RawInputEvent::sync(),
        RawInputEvent::key(28, KeyAction::Released),
    ];
    board.write_events("event3", &events);

    let mut joystick =
        EvdevJoystick::open_in(&board.input_class(), &board.dev(), SENSE_HAT_JOYSTICK).unwrap();
    for expected in events {
        assert_eq!(joystick.next_event().unwrap(), Some(expected));
    }
    assert_eq!(joystick.next_event().unwrap(), None);
}

#[test]
fn truncated_record_is_end_of_stream() {
    let board = FakeBoard::new();
    board.add_input("event1", SENSE_HAT_JOYSTICK);
    let record = evdev::encode(&RawInputEvent::key(28, KeyAction::Pressed));
    fs::write(board.dev().join("event1"), &record[..record.len() - 1]).unwrap();

    let mut joystick = EvdevJoystick::open_path(&board.dev().join("event1")).unwrap();
    assert_eq!(joystick.next_event().unwrap(), None);
}

#[test]
fn poller_drives_state_from_device_file() {
    let board = FakeBoard::new();
    board.add_input("event2", SENSE_HAT_JOYSTICK);
    board.write_events(
        "event2",
        &[
            RawInputEvent::key(28, KeyAction::Released),
            RawInputEvent::sync(),
            RawInputEvent::key(28, KeyAction::Held),
        ],
    );

    let (notifier, mut feed) = change_feed();
    let state = Arc::new(ResourceState::new(
        ResourceId::Joystick,
        SwitchPosition::Down,
        notifier,
    ));
    let indicator = SimulatedIndicator::new();
    let health = Arc::new(PollerHealth::new());
    let joystick =
        EvdevJoystick::open_in(&board.input_class(), &board.dev(), SENSE_HAT_JOYSTICK).unwrap();

    let handle = HardwarePoller::new(
        joystick,
        Arc::clone(&state),
        IndicatorHandle::new(indicator.clone()),
        Arc::clone(&health),
        Duration::from_secs(1),
    )
    .spawn()
    .unwrap();

    assert_eq!(handle.join(), Some(PollerExit::InputClosed));
    assert_eq!(state.read().value, SwitchPosition::Up);
    assert_eq!(feed.try_recv().map(|c| c.version).ok(), Some(1));
    assert!(feed.try_recv().is_err());
    assert_eq!(indicator.history(), vec![LedColor::Red.rgb()]);
    assert_eq!(health.status(), PollerStatus::Stopped);
    assert_eq!(health.report().events, 3);
}
