//! # Device Sampler Module
//!
//! Turns one [`DeviceSnapshot`] per tick into axis samples and edge-triggered
//! button events.
//!
//! ## Axis Samples
//!
//! - Gamepad: the left stick, whenever a gamepad is connected
//! - Keyboard: direction keys summed per axis into -1, 0 or +1, only while
//!   at least one direction key is held
//!
//! No gamepad and no direction key means no sample at all, not a zero vector.
//!
//! ## Button Edges
//!
//! Each logical button fires once on its released-to-pressed transition.
//! Holding produces nothing; releasing re-arms the edge.
//!
//! | Logical button | Sources | Event |
//! |----------------|---------|-------|
//! | Laser | Gamepad South, Space | [`ButtonEvent::ToggleLaser`] |
//! | Mode | Gamepad North, X | [`ButtonEvent::ToggleMode`] |
//! | Auxiliary | Gamepad West | [`ButtonEvent::Auxiliary`] |

use super::input::{DeviceSnapshot, KeyState};

/// Which device produced an axis sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisSource {
    Gamepad,
    Keyboard,
}

/// Normalized pan/tilt deflection from one device, each in -1.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisSample {
    pub source: AxisSource,
    pub pan: f32,
    pub tilt: f32,
}

/// Discrete, edge-triggered action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    ToggleLaser,
    ToggleMode,
    /// Tracked but bound to nothing yet
    Auxiliary,
}

/// Output of one sampling tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleFrame {
    pub gamepad: Option<AxisSample>,
    pub keyboard: Option<AxisSample>,
    pub buttons: Vec<ButtonEvent>,
}

/// Pressed state of every logical button on the previous tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Pressed {
    laser: bool,
    mode: bool,
    auxiliary: bool,
}

impl Pressed {
    fn from_snapshot(snapshot: &DeviceSnapshot) -> Self {
        let pad = snapshot.gamepad.map(|g| g.buttons).unwrap_or_default();
        Self {
            laser: pad.south || snapshot.keys.laser,
            mode: pad.north || snapshot.keys.mode,
            auxiliary: pad.west,
        }
    }
}

/// Samples devices once per tick
#[derive(Debug, Default)]
pub struct DeviceSampler {
    previous: Pressed,
}

impl DeviceSampler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sample one tick
    ///
    /// # Examples
    ///
    /// ```
    /// use turret_console::controller::input::{DeviceSnapshot, KeyState};
    /// use turret_console::controller::sampler::{ButtonEvent, DeviceSampler};
    ///
    /// let mut sampler = DeviceSampler::new();
    /// let held = DeviceSnapshot {
    ///     keys: KeyState { laser: true, ..KeyState::default() },
    ///     ..DeviceSnapshot::default()
    /// };
    ///
    /// assert_eq!(sampler.sample(&held).buttons, vec![ButtonEvent::ToggleLaser]);
    /// assert!(sampler.sample(&held).buttons.is_empty());
    /// ```
    pub fn sample(&mut self, snapshot: &DeviceSnapshot) -> SampleFrame {
        let pressed = Pressed::from_snapshot(snapshot);
        let previous = std::mem::replace(&mut self.previous, pressed);

        let mut buttons = Vec::new();
        if pressed.laser && !previous.laser {
            buttons.push(ButtonEvent::ToggleLaser);
        }
        if pressed.mode && !previous.mode {
            buttons.push(ButtonEvent::ToggleMode);
        }
        if pressed.auxiliary && !previous.auxiliary {
            buttons.push(ButtonEvent::Auxiliary);
        }

        SampleFrame {
            gamepad: snapshot.gamepad.map(|g| AxisSample {
                source: AxisSource::Gamepad,
                pan: g.pan,
                tilt: g.tilt,
            }),
            keyboard: keyboard_sample(&snapshot.keys),
            buttons,
        }
    }
}

/// Sum held direction keys per axis
fn keyboard_sample(keys: &KeyState) -> Option<AxisSample> {
    if !keys.any_direction() {
        return None;
    }

    let axis = |negative: bool, positive: bool| -> f32 {
        let mut value = 0.0;
        if negative {
            value -= 1.0;
        }
        if positive {
            value += 1.0;
        }
        value
    };

    Some(AxisSample {
        source: AxisSource::Keyboard,
        pan: axis(keys.left, keys.right),
        tilt: axis(keys.up, keys.down),
    })
}
