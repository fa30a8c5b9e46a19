//! Domain values held by the stateful resources.
//!
//! [`LedColor`] is the value of the `/led` resource and [`SwitchPosition`]
//! the value of `/joystick`. Both render as their lowercase names, which is
//! also the plain-text payload format on the wire.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An RGB triple sent to the hardware indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// All channels off.
    pub const OFF: Self = Self::new(0, 0, 0);

    /// Build a color from its channels.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Error returned when a payload does not name a known color.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown color: {0:?}")]
pub struct UnknownColor(pub String);

/// The fixed set of colors the LED display accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LedColor {
    /// Full red.
    Red,
    /// Full green.
    Green,
    /// Orange (255, 165, 0).
    Orange,
}

impl LedColor {
    /// Every accepted color, in listing order.
    pub const ALL: [Self; 3] = [Self::Red, Self::Green, Self::Orange];

    /// The lowercase name used on the wire.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Green => "green",
            Self::Orange => "orange",
        }
    }

    /// The RGB triple this color is drawn with.
    pub const fn rgb(self) -> Rgb {
        match self {
            Self::Red => Rgb::new(255, 0, 0),
            Self::Green => Rgb::new(0, 255, 0),
            Self::Orange => Rgb::new(255, 165, 0),
        }
    }
}

impl fmt::Display for LedColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LedColor {
    type Err = UnknownColor;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|color| color.name() == s)
            .ok_or_else(|| UnknownColor(s.to_owned()))
    }
}

/// Position of the joystick switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SwitchPosition {
    /// Released after having been pressed.
    Up,
    /// Resting position.
    Down,
}

impl SwitchPosition {
    /// The lowercase name used on the wire.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }

    /// Indicator color shown after the switch enters this position.
    pub const fn feedback_color(self) -> Rgb {
        match self {
            Self::Up => LedColor::Red.rgb(),
            Self::Down => LedColor::Green.rgb(),
        }
    }
}

impl fmt::Display for SwitchPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A value of any stateful resource, as carried by change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResourceValue {
    /// Value of the LED display.
    Led(LedColor),
    /// Value of the joystick switch.
    Joystick(SwitchPosition),
}

impl fmt::Display for ResourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Led(color) => fmt::Display::fmt(color, f),
            Self::Joystick(position) => fmt::Display::fmt(position, f),
        }
    }
}

impl From<LedColor> for ResourceValue {
    fn from(color: LedColor) -> Self {
        Self::Led(color)
    }
}

impl From<SwitchPosition> for ResourceValue {
    fn from(position: SwitchPosition) -> Self {
        Self::Joystick(position)
    }
}
