//! # Calibration Session Module
//!
//! Routes pointer clicks on the video surface either to calibration sampling
//! or to detection simulation.
//!
//! ```text
//! Disarmed --arm(kind)--> Armed(kind) --click--> Disarmed
//!                         Armed(kind) --commit--> Disarmed
//! ```
//!
//! Calibration samples are sent in frame pixels because the sample is
//! geometry data for the turret's fit. Simulation clicks are sent in display
//! pixels together with the display size; the turret scales those itself.

use super::coords::CoordinateMapper;
use crate::remote::protocol::{Outbound, SampleKind, SIMULATED_DETECTION_SIZE};
use tracing::{debug, info, warn};

/// Pointer click on the video display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerClick {
    /// Click position relative to the display's top-left corner
    pub x: f64,
    pub y: f64,
    /// Display box size at the time of the click
    pub display_w: f64,
    pub display_h: f64,
}

/// Whether the next click is a calibration sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArmState {
    #[default]
    Disarmed,
    Armed(SampleKind),
}

/// Calibration point in frame pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSample {
    pub frame_x: f64,
    pub frame_y: f64,
    pub kind: SampleKind,
}

impl From<CalibrationSample> for Outbound {
    fn from(sample: CalibrationSample) -> Self {
        Outbound::CalibrationSample {
            x: sample.frame_x,
            y: sample.frame_y,
            kind: sample.kind,
        }
    }
}

/// Simulated detection in display pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationTrigger {
    pub x: f64,
    pub y: f64,
    pub w: u32,
    pub h: u32,
    pub display_w: f64,
    pub display_h: f64,
}

impl From<SimulationTrigger> for Outbound {
    fn from(trigger: SimulationTrigger) -> Self {
        Outbound::MockDetection {
            x: trigger.x,
            y: trigger.y,
            w: trigger.w,
            h: trigger.h,
            display_w: trigger.display_w,
            display_h: trigger.display_h,
        }
    }
}

/// Where a click went
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickRoute {
    Calibration(CalibrationSample),
    Simulate(SimulationTrigger),
}

impl From<ClickRoute> for Outbound {
    fn from(route: ClickRoute) -> Self {
        match route {
            ClickRoute::Calibration(sample) => sample.into(),
            ClickRoute::Simulate(trigger) => trigger.into(),
        }
    }
}

/// Calibration arm state plus operator feedback
#[derive(Debug, Clone)]
pub struct CalibrationSession {
    state: ArmState,
    simulate_box: u32,
    submitted: usize,
    last_kind: Option<SampleKind>,
    status: String,
}

impl Default for CalibrationSession {
    fn default() -> Self {
        Self::new(SIMULATED_DETECTION_SIZE)
    }
}

impl CalibrationSession {
    /// Creates a disarmed session
    ///
    /// # Arguments
    ///
    /// * `simulate_box` - Side of the box sent with simulation clicks, in display pixels
    #[must_use]
    pub fn new(simulate_box: u32) -> Self {
        Self {
            state: ArmState::Disarmed,
            simulate_box,
            submitted: 0,
            last_kind: None,
            status: "Calibration idle".to_string(),
        }
    }

    #[must_use]
    pub fn state(&self) -> ArmState {
        self.state
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        matches!(self.state, ArmState::Armed(_))
    }

    /// Samples submitted since the last clear
    #[must_use]
    pub fn sample_count(&self) -> usize {
        self.submitted
    }

    /// Operator feedback line
    #[must_use]
    pub fn status_text(&self) -> &str {
        &self.status
    }

    /// Arm for one sample of the given kind
    pub fn arm(&mut self, kind: SampleKind) {
        self.state = ArmState::Armed(kind);
        self.status = match kind {
            SampleKind::XCalib => "Mode: X-Calib (Fix Tilt, Click Points)",
            SampleKind::YCalib => "Mode: Y-Calib (Fix Pan, Click Points)",
        }
        .to_string();
        info!("Calibration armed for {}", kind.as_str());
    }

    /// Disarm on a save/commit action
    pub fn commit(&mut self) {
        if self.is_armed() {
            debug!("Calibration disarmed by commit");
        }
        self.state = ArmState::Disarmed;
    }

    /// Route a pointer click
    ///
    /// When armed, the click becomes a calibration sample in frame pixels and
    /// the session disarms. Otherwise it becomes a simulation trigger and the
    /// state is unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// use turret_console::remote::protocol::SampleKind;
    /// use turret_console::view::calibration::{ArmState, CalibrationSession, ClickRoute, PointerClick};
    /// use turret_console::view::coords::CoordinateMapper;
    ///
    /// let mapper = CoordinateMapper::default();
    /// let mut session = CalibrationSession::default();
    /// let click = PointerClick { x: 160.0, y: 120.0, display_w: 320.0, display_h: 240.0 };
    ///
    /// session.arm(SampleKind::XCalib);
    /// match session.on_pointer_click(&click, &mapper) {
    ///     ClickRoute::Calibration(sample) => assert_eq!((sample.frame_x, sample.frame_y), (320.0, 240.0)),
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// assert_eq!(session.state(), ArmState::Disarmed);
    /// ```
    pub fn on_pointer_click(&mut self, click: &PointerClick, mapper: &CoordinateMapper) -> ClickRoute {
        match self.state {
            ArmState::Armed(kind) => {
                let (frame_x, frame_y) = mapper.to_frame(click.x, click.y, click.display_w, click.display_h);
                self.state = ArmState::Disarmed;
                self.submitted += 1;
                self.last_kind = Some(kind);
                debug!(
                    "Calibration sample {} [{}] at frame ({:.1}, {:.1})",
                    self.submitted,
                    kind.as_str(),
                    frame_x,
                    frame_y
                );
                ClickRoute::Calibration(CalibrationSample {
                    frame_x,
                    frame_y,
                    kind,
                })
            }
            ArmState::Disarmed => ClickRoute::Simulate(SimulationTrigger {
                x: click.x,
                y: click.y,
                w: self.simulate_box,
                h: self.simulate_box,
                display_w: click.display_w,
                display_h: click.display_h,
            }),
        }
    }

    /// Turret acknowledged a sample at the given actuator position
    pub fn on_ack(&mut self, pan: f64, tilt: f64) {
        let kind = self.last_kind.map_or("general", SampleKind::as_str);
        self.status = format!(
            "Sample Added [{}] P:{} T:{}",
            kind,
            pan.round() as i64,
            tilt.round() as i64
        );
        info!("{} ({} submitted)", self.status, self.submitted);
    }

    /// Turret finished fitting the samples
    pub fn on_fitted(&mut self, success: bool, msg: Option<&str>) {
        self.commit();
        if success {
            self.status = "Calibration Saved!".to_string();
            info!("Calibration fit succeeded");
        } else {
            self.status = format!("Calibration Failed: {}", msg.unwrap_or("unknown error"));
            warn!("{}", self.status);
        }
    }

    /// Turret cleared its sample set
    pub fn on_cleared(&mut self, success: bool) {
        if success {
            self.submitted = 0;
            self.last_kind = None;
            self.status = "Samples Cleared".to_string();
        } else {
            self.status = "Clear Failed".to_string();
            warn!("Turret failed to clear calibration samples");
        }
    }

    /// Turret answered a persist request
    pub fn on_config_saved(&mut self, success: bool) {
        if success {
            self.status = "Config Saved".to_string();
            info!("Turret configuration saved");
        } else {
            self.status = "Save Failed".to_string();
            warn!("Turret failed to save its configuration");
        }
    }
}
