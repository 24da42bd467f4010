//! # Report Decoder
//!
//! Parses inbound lines into [`Inbound`] messages and normalizes them into
//! [`Report`]s. The two status vocabularies (`gimbal_state.mode` and
//! `auto_status.state`) are folded into a single [`ModeReport`] here so no
//! other component branches on field presence.

use super::protocol::{AutoStatus, GimbalState, Inbound, Mode};
use crate::error::{ConsoleError, Result};

/// Mode indicator as carried on the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModeReport {
    /// Plain `mode` field (`"manual"` / `"auto"`)
    Mode(String),
    /// Autopilot `state` field (`"AUTO_READY"`, `"AUTO_COOLDOWN"`, ...)
    State(String),
}

impl ModeReport {
    /// Raw string as received
    #[must_use]
    pub fn raw(&self) -> &str {
        match self {
            ModeReport::Mode(raw) | ModeReport::State(raw) => raw,
        }
    }

    /// Canonical mode derived from the raw string
    #[must_use]
    pub fn mode(&self) -> Mode {
        Mode::from_raw(self.raw())
    }
}

/// Partial status update. `None` means "no update for this field".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusReport {
    pub mode: Option<ModeReport>,
    pub laser: Option<bool>,
    pub pan: Option<f64>,
    pub tilt: Option<f64>,
    pub frame_size: Option<(u32, u32)>,
    pub roi: Option<(f64, f64)>,
    pub roi_radius: Option<f64>,
    pub bboxes: Option<Vec<[f64; 4]>>,
}

impl From<GimbalState> for StatusReport {
    fn from(state: GimbalState) -> Self {
        Self {
            mode: state.mode.map(ModeReport::Mode),
            laser: state.laser,
            pan: state.pan,
            tilt: state.tilt,
            ..Self::default()
        }
    }
}

impl From<AutoStatus> for StatusReport {
    fn from(status: AutoStatus) -> Self {
        Self {
            mode: status.state.map(ModeReport::State),
            laser: status.laser,
            pan: status.pan,
            tilt: status.tilt,
            frame_size: status.frame_size.map(|[w, h]| (w, h)),
            roi: status.roi.map(|[x, y]| (x, y)),
            roi_radius: status.roi_radius,
            bboxes: status.bboxes,
        }
    }
}

/// Normalized inbound event
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    /// Link came up (`true`) or went down (`false`)
    Link(bool),
    Status(StatusReport),
    CalibrationAck { pan: f64, tilt: f64 },
    CalibrationFitted { success: bool, msg: Option<String> },
    CalibrationCleared { success: bool },
    ConfigSaved { success: bool },
}

impl From<Inbound> for Report {
    fn from(inbound: Inbound) -> Self {
        match inbound {
            Inbound::GimbalState(state) => Report::Status(state.into()),
            Inbound::AutoStatus(status) => Report::Status(status.into()),
            Inbound::CalibrationAck(ack) => Report::CalibrationAck {
                pan: ack.pan,
                tilt: ack.tilt,
            },
            Inbound::CalibrationResult(outcome) => Report::CalibrationFitted {
                success: outcome.success,
                msg: outcome.msg,
            },
            Inbound::CalibrationCleared(outcome) => Report::CalibrationCleared {
                success: outcome.success,
            },
            Inbound::ConfigSaved(outcome) => Report::ConfigSaved {
                success: outcome.success,
            },
        }
    }
}

/// Decode one wire line into a [`Report`]
///
/// # Errors
///
/// Returns error if:
/// - Line is empty
/// - JSON is malformed or the event name is unknown
///
/// # Examples
///
/// ```
/// use turret_console::remote::decoder::{decode_line, Report};
///
/// let report = decode_line(r#"{"event":"gimbal_state","data":{"pan":12.5}}"#)?;
/// assert!(matches!(report, Report::Status(_)));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn decode_line(line: &str) -> Result<Report> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ConsoleError::Link("Empty line".to_string()));
    }

    let inbound: Inbound = serde_json::from_str(line)?;
    Ok(inbound.into())
}
