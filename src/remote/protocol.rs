//! # Turret Wire Protocol
//!
//! Message vocabulary exchanged with the turret host. Every message is one
//! JSON object per line of the form `{"event": <name>, "data": {...}}`;
//! events without a payload omit `data`.
//!
//! ## Outbound (console → turret)
//!
//! | Event | Payload |
//! |-------|---------|
//! | `toggle_laser` | none |
//! | `set_mode` | `{mode: "manual" \| "auto"}` |
//! | `joystick_control` | `{pan_axis, tilt_axis}` in -1.0..=1.0 |
//! | `calibration_sample` | `{x, y, type}` in frame pixels |
//! | `mock_detection` | `{x, y, w, h, display_w, display_h}` in display pixels |
//! | `calibration_clear` / `calibration_fit` / `save_config` | none |
//!
//! ## Inbound (turret → console)
//!
//! | Event | Payload |
//! |-------|---------|
//! | `gimbal_state` | `{laser?, mode?, pan?, tilt?}` |
//! | `auto_status` | `{state?, laser?, pan?, tilt?, frame_size?, roi?, roi_radius?, bboxes?}` |
//! | `calibration_ack` | `{pan, tilt}` |
//! | `calibration_result` / `calibration_cleared` / `config_saved` | `{success, msg?}` |

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// Default side length of a simulated detection box, in display pixels
pub const SIMULATED_DETECTION_SIZE: u32 = 50;

/// Operating mode of the turret.
///
/// In [`Mode::Auto`] the turret's vision loop owns actuation and manual axis
/// input is suppressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Manual,
    Auto,
}

impl Mode {
    /// Classifies a raw `mode` or `state` string.
    ///
    /// Anything containing `auto` (any case) is [`Mode::Auto`]. This also
    /// catches autopilot sub-states such as `AUTO_COOLDOWN`.
    ///
    /// ```
    /// use turret_console::remote::protocol::Mode;
    ///
    /// assert_eq!(Mode::from_raw("AUTO_READY"), Mode::Auto);
    /// assert_eq!(Mode::from_raw("manual"), Mode::Manual);
    /// ```
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        if raw.to_ascii_lowercase().contains("auto") {
            Mode::Auto
        } else {
            Mode::Manual
        }
    }

    /// The other mode
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Mode::Manual => Mode::Auto,
            Mode::Auto => Mode::Manual,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Manual => "manual",
            Mode::Auto => "auto",
        }
    }
}

/// Which axis a calibration sample constrains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SampleKind {
    /// Tilt held fixed, clicks sweep pan
    #[serde(rename = "x_calib")]
    XCalib,
    /// Pan held fixed, clicks sweep tilt
    #[serde(rename = "y_calib")]
    YCalib,
}

impl SampleKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SampleKind::XCalib => "x_calib",
            SampleKind::YCalib => "y_calib",
        }
    }
}

/// Message sent from the console to the turret
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Outbound {
    ToggleLaser,
    SetMode {
        mode: Mode,
    },
    JoystickControl {
        pan_axis: f32,
        tilt_axis: f32,
    },
    CalibrationSample {
        x: f64,
        y: f64,
        #[serde(rename = "type")]
        kind: SampleKind,
    },
    MockDetection {
        x: f64,
        y: f64,
        w: u32,
        h: u32,
        display_w: f64,
        display_h: f64,
    },
    CalibrationClear,
    CalibrationFit,
    SaveConfig,
}

impl Outbound {
    /// Wire event name
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            Outbound::ToggleLaser => "toggle_laser",
            Outbound::SetMode { .. } => "set_mode",
            Outbound::JoystickControl { .. } => "joystick_control",
            Outbound::CalibrationSample { .. } => "calibration_sample",
            Outbound::MockDetection { .. } => "mock_detection",
            Outbound::CalibrationClear => "calibration_clear",
            Outbound::CalibrationFit => "calibration_fit",
            Outbound::SaveConfig => "save_config",
        }
    }
}

/// Discrete gimbal state push
///
/// Fields are decoded one by one: a field with an unexpected type reads as
/// absent and leaves the others intact.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct GimbalState {
    #[serde(default, deserialize_with = "lenient")]
    pub laser: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub mode: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub pan: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub tilt: Option<f64>,
}

/// Continuous autopilot status push, decoded per field like [`GimbalState`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AutoStatus {
    #[serde(default, deserialize_with = "lenient")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub laser: Option<bool>,
    #[serde(default, deserialize_with = "lenient")]
    pub pan: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub tilt: Option<f64>,
    #[serde(default, deserialize_with = "lenient")]
    pub frame_size: Option<[u32; 2]>,
    #[serde(default, deserialize_with = "lenient")]
    pub roi: Option<[f64; 2]>,
    #[serde(default, deserialize_with = "lenient")]
    pub roi_radius: Option<f64>,
    /// `[x, y, w, h]` per detection, in frame pixels
    #[serde(default, deserialize_with = "detection_boxes")]
    pub bboxes: Option<Vec<[f64; 4]>>,
}

/// One entry of `bboxes`: a bare box or a detector record carrying one
#[derive(Deserialize)]
#[serde(untagged)]
enum BoxEntry {
    Plain([f64; 4]),
    Detection { bbox: [f64; 4] },
}

impl From<BoxEntry> for [f64; 4] {
    fn from(entry: BoxEntry) -> Self {
        match entry {
            BoxEntry::Plain(bbox) | BoxEntry::Detection { bbox } => bbox,
        }
    }
}

/// Decode a field, reading a value of the wrong type as absent
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    match serde_json::from_value(value) {
        Ok(decoded) => Ok(Some(decoded)),
        Err(e) => {
            debug!("Ignoring malformed field: {}", e);
            Ok(None)
        }
    }
}

/// Decode `bboxes`, skipping entries that are neither shape
fn detection_boxes<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<[f64; 4]>>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries: Option<Vec<Value>> = lenient(deserializer)?;
    Ok(entries.map(|entries| {
        entries
            .into_iter()
            .filter_map(|entry| serde_json::from_value::<BoxEntry>(entry).ok())
            .map(Into::into)
            .collect()
    }))
}

/// Acknowledgement of a calibration sample, carrying the actuator position
/// recorded alongside it
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct CalibrationAck {
    pub pan: f64,
    pub tilt: f64,
}

/// Success indicator for clear / fit / persist triggers
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Outcome {
    pub success: bool,
    #[serde(default)]
    pub msg: Option<String>,
}

/// Message received from the turret
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum Inbound {
    GimbalState(GimbalState),
    AutoStatus(AutoStatus),
    CalibrationAck(CalibrationAck),
    CalibrationResult(Outcome),
    CalibrationCleared(Outcome),
    ConfigSaved(Outcome),
}
