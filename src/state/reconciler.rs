//! # State Reconciler Module
//!
//! Superimposes the turret's two status streams (discrete `gimbal_state`
//! pushes and continuous `auto_status` pushes) onto one [`RemoteState`].
//!
//! Every field is updated independently. A report only writes the fields it
//! carries; anything absent keeps its previous value. Reports are applied in
//! arrival order, last write wins per field.

use tracing::{debug, info};

use crate::remote::decoder::{ModeReport, StatusReport};
use crate::remote::protocol::Mode;

/// ROI half-size drawn when the turret does not send one
pub const DEFAULT_ROI_RADIUS: f64 = 35.0;

/// Detection overlay data, drawn over the video by the presentation layer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub frame_size: Option<(u32, u32)>,
    pub roi: Option<(f64, f64)>,
    pub roi_radius: Option<f64>,
    pub bboxes: Vec<[f64; 4]>,
}

impl Overlay {
    /// ROI half-size in frame pixels
    #[must_use]
    pub fn roi_radius_or_default(&self) -> f64 {
        self.roi_radius.unwrap_or(DEFAULT_ROI_RADIUS)
    }
}

/// Canonical presentation snapshot of the turret
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteState {
    pub connected: bool,
    pub mode: Mode,
    /// Raw autopilot state (`"AUTO_COOLDOWN"`, ...) when the mode came from
    /// an `auto_status` push
    pub sub_state: Option<String>,
    pub laser_on: bool,
    pub pan_deg: Option<f64>,
    pub tilt_deg: Option<f64>,
    pub overlay: Overlay,
    mode_text: String,
}

impl Default for RemoteState {
    fn default() -> Self {
        Self {
            connected: false,
            mode: Mode::Manual,
            sub_state: None,
            laser_on: false,
            pan_deg: None,
            tilt_deg: None,
            overlay: Overlay::default(),
            mode_text: "MANUAL".to_string(),
        }
    }
}

/// Display form of a raw mode/state string: underscores become spaces, upper
/// case
///
/// ```
/// use turret_console::state::reconciler::display_text;
///
/// assert_eq!(display_text("AUTO_COOLDOWN"), "AUTO COOLDOWN");
/// assert_eq!(display_text("manual"), "MANUAL");
/// ```
#[must_use]
pub fn display_text(raw: &str) -> String {
    raw.replace('_', " ").to_uppercase()
}

impl RemoteState {
    /// HUD mode text
    #[must_use]
    pub fn mode_text(&self) -> &str {
        &self.mode_text
    }

    /// CSS-style class for the auto toggle button
    #[must_use]
    pub fn mode_class(&self) -> &'static str {
        match self.mode {
            Mode::Auto => "active",
            Mode::Manual => "",
        }
    }

    /// Label of the auto toggle button
    #[must_use]
    pub fn toggle_label(&self) -> &'static str {
        match self.mode {
            Mode::Manual => "Enable Auto Mode",
            Mode::Auto => "Stop Auto Mode",
        }
    }

    #[must_use]
    pub fn laser_text(&self) -> &'static str {
        if self.laser_on {
            "ON"
        } else {
            "OFF"
        }
    }

    #[must_use]
    pub fn connection_text(&self) -> &'static str {
        if self.connected {
            "Connected"
        } else {
            "Disconnected"
        }
    }

    /// Pan rounded to whole degrees, `--` until reported
    #[must_use]
    pub fn pan_display(&self) -> String {
        degrees(self.pan_deg)
    }

    /// Tilt rounded to whole degrees, `--` until reported
    #[must_use]
    pub fn tilt_display(&self) -> String {
        degrees(self.tilt_deg)
    }

    /// One-line summary for logs
    #[must_use]
    pub fn hud_line(&self) -> String {
        format!(
            "[{}] mode={} laser={} pan={} tilt={}",
            self.connection_text(),
            self.mode_text(),
            self.laser_text(),
            self.pan_display(),
            self.tilt_display()
        )
    }
}

fn degrees(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{}", v.round() as i64),
        _ => "--".to_string(),
    }
}

/// Single writer of [`RemoteState`]
#[derive(Debug, Default)]
pub struct StateReconciler {
    state: RemoteState,
}

impl StateReconciler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current snapshot
    #[must_use]
    pub fn state(&self) -> &RemoteState {
        &self.state
    }

    /// Record link up/down
    pub fn set_connected(&mut self, connected: bool) -> &RemoteState {
        if self.state.connected != connected {
            info!("Turret {}", if connected { "connected" } else { "disconnected" });
        }
        self.state.connected = connected;
        &self.state
    }

    /// Apply a partial report
    ///
    /// # Examples
    ///
    /// ```
    /// use turret_console::remote::decoder::StatusReport;
    /// use turret_console::state::reconciler::StateReconciler;
    ///
    /// let mut reconciler = StateReconciler::new();
    /// reconciler.apply(&StatusReport { laser: Some(true), ..StatusReport::default() });
    /// let state = reconciler.apply(&StatusReport { pan: Some(10.0), ..StatusReport::default() });
    ///
    /// assert!(state.laser_on);
    /// assert_eq!(state.pan_deg, Some(10.0));
    /// ```
    pub fn apply(&mut self, report: &StatusReport) -> &RemoteState {
        let state = &mut self.state;

        if let Some(mode_report) = &report.mode {
            let mode = mode_report.mode();
            if mode != state.mode {
                info!("Mode {} -> {}", state.mode.as_str(), mode.as_str());
            }
            state.mode = mode;
            state.mode_text = display_text(mode_report.raw());
            state.sub_state = match mode_report {
                ModeReport::State(raw) => Some(raw.clone()),
                ModeReport::Mode(_) => None,
            };
        }

        if let Some(laser) = report.laser {
            state.laser_on = laser;
        }
        if let Some(pan) = report.pan {
            state.pan_deg = Some(pan);
        }
        if let Some(tilt) = report.tilt {
            state.tilt_deg = Some(tilt);
        }

        if let Some(frame_size) = report.frame_size {
            state.overlay.frame_size = Some(frame_size);
        }
        if let Some(roi) = report.roi {
            state.overlay.roi = Some(roi);
        }
        if let Some(radius) = report.roi_radius {
            state.overlay.roi_radius = Some(radius);
        }
        if let Some(bboxes) = &report.bboxes {
            state.overlay.bboxes = bboxes.clone();
        }

        debug!("State: {}", state.hud_line());
        &self.state
    }
}
