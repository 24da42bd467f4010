//! # Input Event Mapper Module
//!
//! Folds raw evdev events from a gamepad and a keyboard into the snapshots the
//! sampler reads once per tick.
//!
//! ## Gamepad
//!
//! | Input | evdev Code | Function |
//! |-------|------------|----------|
//! | Left Stick X | ABS_X | Pan |
//! | Left Stick Y | ABS_Y | Tilt |
//! | A / Cross | BTN_SOUTH | Toggle laser |
//! | Y / Triangle | BTN_NORTH | Toggle mode |
//! | X / Square | BTN_WEST | Auxiliary (reserved) |
//!
//! ## Keyboard
//!
//! | Key | Function |
//! |-----|----------|
//! | W / Up | Tilt -1 |
//! | S / Down | Tilt +1 |
//! | A / Left | Pan -1 |
//! | D / Right | Pan +1 |
//! | Space | Toggle laser |
//! | X | Toggle mode |

use evdev::{AbsoluteAxisType, InputEvent, InputEventKind, Key};

/// Raw range reported by a stick axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisRange {
    pub min: i32,
    pub max: i32,
}

impl Default for AxisRange {
    /// DualSense-style 8-bit axis
    fn default() -> Self {
        Self { min: 0, max: 255 }
    }
}

impl AxisRange {
    #[must_use]
    pub fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Maps a raw value onto -1.0..=1.0, center at 0.0.
    ///
    /// A degenerate range (`max <= min`) maps everything to 0.0.
    ///
    /// ```
    /// use turret_console::controller::input::AxisRange;
    ///
    /// let range = AxisRange::new(-32768, 32767);
    /// assert_eq!(range.normalize(-32768), -1.0);
    /// assert_eq!(range.normalize(32767), 1.0);
    /// ```
    #[must_use]
    pub fn normalize(&self, raw: i32) -> f32 {
        if self.max <= self.min {
            return 0.0;
        }
        let span = (self.max as f64) - (self.min as f64);
        let unit = ((raw as f64) - (self.min as f64)) / span;
        ((unit * 2.0 - 1.0) as f32).clamp(-1.0, 1.0)
    }
}

/// Gamepad buttons that carry an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GamepadButtons {
    pub south: bool,
    pub north: bool,
    pub west: bool,
}

/// Gamepad state at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GamepadSnapshot {
    /// Normalized pan deflection, -1.0 (left) to 1.0 (right)
    pub pan: f32,
    /// Normalized tilt deflection, -1.0 (up) to 1.0 (down)
    pub tilt: f32,
    pub buttons: GamepadButtons,
}

/// Held keyboard keys relevant to the console
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyState {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
    pub laser: bool,
    pub mode: bool,
}

impl KeyState {
    /// Any direction key held
    #[must_use]
    pub fn any_direction(&self) -> bool {
        self.up || self.down || self.left || self.right
    }
}

/// Everything the sampler sees on one tick
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DeviceSnapshot {
    /// `None` when no gamepad is connected
    pub gamepad: Option<GamepadSnapshot>,
    pub keys: KeyState,
}

/// Accumulates gamepad events into a [`GamepadSnapshot`].
///
/// Not thread-safe. Use from a single task only.
#[derive(Debug, Default)]
pub struct GamepadMapper {
    x_range: AxisRange,
    y_range: AxisRange,
    raw_x: Option<i32>,
    raw_y: Option<i32>,
    buttons: GamepadButtons,
}

impl GamepadMapper {
    /// Creates a mapper for a gamepad with the given stick ranges
    #[must_use]
    pub fn new(x_range: AxisRange, y_range: AxisRange) -> Self {
        Self {
            x_range,
            y_range,
            ..Self::default()
        }
    }

    /// Current snapshot. Axes that have not reported yet read as centered.
    #[must_use]
    pub fn snapshot(&self) -> GamepadSnapshot {
        GamepadSnapshot {
            pan: self.raw_x.map_or(0.0, |v| self.x_range.normalize(v)),
            tilt: self.raw_y.map_or(0.0, |v| self.y_range.normalize(v)),
            buttons: self.buttons,
        }
    }

    /// Processes a single evdev input event
    pub fn process_event(&mut self, event: &InputEvent) {
        match event.kind() {
            InputEventKind::AbsAxis(axis) => self.process_axis_event(axis, event.value()),
            InputEventKind::Key(key) => self.process_key_event(key, event.value() != 0),
            _ => {
                // Ignore sync events and other event types
            }
        }
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) {
        match axis {
            AbsoluteAxisType::ABS_X => self.raw_x = Some(value),
            AbsoluteAxisType::ABS_Y => self.raw_y = Some(value),
            _ => {}
        }
    }

    fn process_key_event(&mut self, key: Key, pressed: bool) {
        match key {
            Key::BTN_SOUTH => self.buttons.south = pressed,
            Key::BTN_NORTH => self.buttons.north = pressed,
            Key::BTN_WEST => self.buttons.west = pressed,
            _ => {}
        }
    }
}

/// Accumulates keyboard events into a [`KeyState`].
///
/// Key repeat events (value 2) count as held.
#[derive(Debug, Default)]
pub struct KeyboardMapper {
    state: KeyState,
}

impl KeyboardMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> KeyState {
        self.state
    }

    /// Processes a single evdev input event
    pub fn process_event(&mut self, event: &InputEvent) {
        if let InputEventKind::Key(key) = event.kind() {
            let pressed = event.value() != 0;
            match key {
                Key::KEY_W | Key::KEY_UP => self.state.up = pressed,
                Key::KEY_S | Key::KEY_DOWN => self.state.down = pressed,
                Key::KEY_A | Key::KEY_LEFT => self.state.left = pressed,
                Key::KEY_D | Key::KEY_RIGHT => self.state.right = pressed,
                Key::KEY_SPACE => self.state.laser = pressed,
                Key::KEY_X => self.state.mode = pressed,
                _ => {}
            }
        }
    }

    /// Releases every key, e.g. after the keyboard disappears
    pub fn reset(&mut self) {
        self.state = KeyState::default();
    }
}
