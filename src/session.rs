//! # Session Module
//!
//! The console's whole mutable state in one context object, advanced by a
//! single `tick` call per scheduling frame.
//!
//! ## Tick Order
//!
//! 1. Apply inbound reports (so the mode is fresh)
//! 2. Apply operator actions (clicks, calibration buttons, mode toggle)
//! 3. Sample devices, emit button commands, then at most one axis command
//!
//! `tick` never blocks and never fails. It returns the commands to send and
//! the resulting state snapshot; sending is the caller's job.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::Config;
use crate::control::arbiter::CommandArbiter;
use crate::controller::input::DeviceSnapshot;
use crate::controller::sampler::DeviceSampler;
use crate::remote::decoder::Report;
use crate::remote::protocol::{Outbound, SampleKind};
use crate::state::reconciler::{RemoteState, StateReconciler};
use crate::view::calibration::{CalibrationSession, PointerClick};
use crate::view::coords::{CoordinateMapper, FrameGeometry};

/// Operator action that does not come from a polled device
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OperatorAction {
    /// Click on the video surface
    Click(PointerClick),
    /// Arm calibration for one sample
    ArmCalibration(SampleKind),
    /// Fit the collected samples and disarm
    SaveCalibration,
    /// Discard the turret's collected samples
    ClearCalibration,
    /// Persist the turret's configuration
    PersistConfig,
    /// Auto mode toggle button
    ToggleMode,
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    /// Messages to send, in order
    pub commands: Vec<Outbound>,
    /// State after this tick
    pub state: RemoteState,
}

/// Console context object
#[derive(Debug)]
pub struct Session {
    sampler: DeviceSampler,
    arbiter: CommandArbiter,
    mapper: CoordinateMapper,
    calibration: CalibrationSession,
    reconciler: StateReconciler,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(
            CommandArbiter::default(),
            CoordinateMapper::default(),
            CalibrationSession::default(),
        )
    }
}

impl Session {
    #[must_use]
    pub fn new(arbiter: CommandArbiter, mapper: CoordinateMapper, calibration: CalibrationSession) -> Self {
        Self {
            sampler: DeviceSampler::new(),
            arbiter,
            mapper,
            calibration,
            reconciler: StateReconciler::new(),
        }
    }

    /// Build a session from configuration
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            CommandArbiter::new(
                config.input.deadzone,
                Duration::from_millis(config.input.min_emit_interval_ms),
            ),
            CoordinateMapper::new(FrameGeometry::new(
                config.frame.fallback_width,
                config.frame.fallback_height,
            )),
            CalibrationSession::new(config.frame.simulate_box),
        )
    }

    #[must_use]
    pub fn state(&self) -> &RemoteState {
        self.reconciler.state()
    }

    #[must_use]
    pub fn calibration(&self) -> &CalibrationSession {
        &self.calibration
    }

    #[must_use]
    pub fn mapper(&self) -> &CoordinateMapper {
        &self.mapper
    }

    /// Advance the console by one tick
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Instant;
    /// use turret_console::controller::input::{DeviceSnapshot, KeyState};
    /// use turret_console::remote::protocol::Outbound;
    /// use turret_console::session::Session;
    ///
    /// let mut session = Session::default();
    /// let devices = DeviceSnapshot {
    ///     keys: KeyState { right: true, ..KeyState::default() },
    ///     ..DeviceSnapshot::default()
    /// };
    ///
    /// let output = session.tick(Instant::now(), &devices, &[], &[]);
    /// assert_eq!(output.commands, vec![Outbound::JoystickControl { pan_axis: 1.0, tilt_axis: 0.0 }]);
    /// ```
    pub fn tick(
        &mut self,
        now: Instant,
        devices: &DeviceSnapshot,
        reports: &[Report],
        actions: &[OperatorAction],
    ) -> TickOutput {
        let mut commands = Vec::new();

        for report in reports {
            self.apply_report(report);
        }

        for action in actions {
            if let Some(command) = self.apply_action(action) {
                commands.push(command);
            }
        }

        let frame = self.sampler.sample(devices);
        let mode = self.reconciler.state().mode;

        for &event in &frame.buttons {
            if let Some(command) = self.arbiter.submit_button(event, mode) {
                debug!("Button {:?} -> {}", event, command.event_name());
                commands.push(command);
            }
        }

        if let Some(axis) = self.arbiter.arbitrate(&frame, mode, now) {
            commands.push(axis.into());
        }

        TickOutput {
            commands,
            state: self.reconciler.state().clone(),
        }
    }

    fn apply_report(&mut self, report: &Report) {
        match report {
            Report::Link(connected) => {
                self.reconciler.set_connected(*connected);
            }
            Report::Status(status) => {
                if let Some((width, height)) = status.frame_size {
                    self.mapper.set_reported(FrameGeometry::new(width, height));
                }
                self.reconciler.apply(status);
            }
            Report::CalibrationAck { pan, tilt } => self.calibration.on_ack(*pan, *tilt),
            Report::CalibrationFitted { success, msg } => {
                self.calibration.on_fitted(*success, msg.as_deref());
            }
            Report::CalibrationCleared { success } => self.calibration.on_cleared(*success),
            Report::ConfigSaved { success } => self.calibration.on_config_saved(*success),
        }
    }

    fn apply_action(&mut self, action: &OperatorAction) -> Option<Outbound> {
        match action {
            OperatorAction::Click(click) => {
                Some(self.calibration.on_pointer_click(click, &self.mapper).into())
            }
            OperatorAction::ArmCalibration(kind) => {
                self.calibration.arm(*kind);
                None
            }
            OperatorAction::SaveCalibration => {
                self.calibration.commit();
                Some(Outbound::CalibrationFit)
            }
            OperatorAction::ClearCalibration => Some(Outbound::CalibrationClear),
            OperatorAction::PersistConfig => Some(Outbound::SaveConfig),
            OperatorAction::ToggleMode => Some(Outbound::SetMode {
                mode: self.reconciler.state().mode.toggled(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::devices::{InputSource, MockInputSource};
    use crate::controller::input::{GamepadButtons, GamepadSnapshot, KeyState};
    use crate::remote::decoder::{ModeReport, StatusReport};
    use crate::remote::protocol::Mode;
    use crate::view::calibration::ArmState;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn pad(pan: f32, tilt: f32) -> DeviceSnapshot {
        DeviceSnapshot {
            gamepad: Some(GamepadSnapshot {
                pan,
                tilt,
                buttons: GamepadButtons::default(),
            }),
            keys: KeyState::default(),
        }
    }

    fn mode_report(raw: &str) -> Report {
        Report::Status(StatusReport {
            mode: Some(ModeReport::Mode(raw.to_string())),
            ..StatusReport::default()
        })
    }

    fn click(x: f64, y: f64) -> OperatorAction {
        OperatorAction::Click(PointerClick {
            x,
            y,
            display_w: 320.0,
            display_h: 240.0,
        })
    }

    #[test]
    fn test_idle_tick_emits_nothing() {
        let mut session = Session::default();
        let output = session.tick(Instant::now(), &DeviceSnapshot::default(), &[], &[]);
        assert!(output.commands.is_empty());
        assert!(!output.state.connected);
    }

    #[test]
    fn test_gamepad_beats_keyboard() {
        let mut session = Session::default();
        let mut devices = pad(0.7, 0.0);
        devices.keys.left = true;
        let output = session.tick(Instant::now(), &devices, &[], &[]);
        assert_eq!(
            output.commands,
            vec![Outbound::JoystickControl {
                pan_axis: 0.7,
                tilt_axis: 0.0
            }]
        );
    }

    #[test]
    fn test_sixty_hz_ticks_respect_rate_ceiling() {
        let mut session = Session::default();
        let t0 = Instant::now();
        let mut emitted = Vec::new();
        for i in 0..60u64 {
            let now = t0 + ms(i * 16);
            let output = session.tick(now, &pad(1.0, 0.0), &[], &[]);
            if !output.commands.is_empty() {
                emitted.push(i * 16);
            }
        }
        for pair in emitted.windows(2) {
            assert!(pair[1] - pair[0] >= 20);
        }
        // Every other 16ms frame carries a command
        assert_eq!(emitted.len(), 30);
    }

    #[test]
    fn test_auto_report_suppresses_axes_same_tick() {
        let mut session = Session::default();
        let output = session.tick(
            Instant::now(),
            &pad(1.0, 1.0),
            &[Report::Status(StatusReport {
                mode: Some(ModeReport::State("AUTO_READY".to_string())),
                ..StatusReport::default()
            })],
            &[],
        );
        assert!(output.commands.is_empty());
        assert_eq!(output.state.mode, Mode::Auto);
        assert_eq!(output.state.mode_text(), "AUTO READY");
    }

    #[test]
    fn test_back_to_manual_resumes_axes() {
        let mut session = Session::default();
        let t0 = Instant::now();
        session.tick(t0, &pad(1.0, 0.0), &[mode_report("auto")], &[]);
        let output = session.tick(t0 + ms(1), &pad(1.0, 0.0), &[mode_report("manual")], &[]);
        assert_eq!(output.commands.len(), 1);
    }

    #[test]
    fn test_laser_button_works_in_auto() {
        let mut session = Session::default();
        let t0 = Instant::now();
        session.tick(t0, &DeviceSnapshot::default(), &[mode_report("auto")], &[]);

        let mut devices = DeviceSnapshot::default();
        devices.keys.laser = true;
        let output = session.tick(t0 + ms(16), &devices, &[], &[]);
        assert_eq!(output.commands, vec![Outbound::ToggleLaser]);

        // Held: no repeat
        let output = session.tick(t0 + ms(32), &devices, &[], &[]);
        assert!(output.commands.is_empty());
    }

    #[test]
    fn test_mode_key_requests_opposite_mode() {
        let mut session = Session::default();
        let mut devices = DeviceSnapshot::default();
        devices.keys.mode = true;
        let output = session.tick(Instant::now(), &devices, &[mode_report("auto")], &[]);
        assert_eq!(output.commands, vec![Outbound::SetMode { mode: Mode::Manual }]);
    }

    #[test]
    fn test_toggle_button_action() {
        let mut session = Session::default();
        let output = session.tick(
            Instant::now(),
            &DeviceSnapshot::default(),
            &[],
            &[OperatorAction::ToggleMode],
        );
        assert_eq!(output.commands, vec![Outbound::SetMode { mode: Mode::Auto }]);
    }

    #[test]
    fn test_calibration_click_flow() {
        let mut session = Session::default();
        let now = Instant::now();
        let output = session.tick(
            now,
            &DeviceSnapshot::default(),
            &[],
            &[
                OperatorAction::ArmCalibration(SampleKind::XCalib),
                click(160.0, 120.0),
                click(160.0, 120.0),
            ],
        );
        assert_eq!(
            output.commands,
            vec![
                Outbound::CalibrationSample {
                    x: 320.0,
                    y: 240.0,
                    kind: SampleKind::XCalib
                },
                Outbound::MockDetection {
                    x: 160.0,
                    y: 120.0,
                    w: 50,
                    h: 50,
                    display_w: 320.0,
                    display_h: 240.0
                },
            ]
        );
        assert_eq!(session.calibration().state(), ArmState::Disarmed);
        assert_eq!(session.calibration().sample_count(), 1);

        session.tick(
            now,
            &DeviceSnapshot::default(),
            &[Report::CalibrationAck { pan: 90.0, tilt: 45.0 }],
            &[],
        );
        assert_eq!(session.calibration().status_text(), "Sample Added [x_calib] P:90 T:45");
    }

    #[test]
    fn test_reported_frame_size_feeds_mapper() {
        let mut session = Session::default();
        let output = session.tick(
            Instant::now(),
            &DeviceSnapshot::default(),
            &[Report::Status(StatusReport {
                frame_size: Some((1280, 960)),
                ..StatusReport::default()
            })],
            &[
                OperatorAction::ArmCalibration(SampleKind::YCalib),
                click(160.0, 120.0),
            ],
        );
        assert_eq!(
            output.commands,
            vec![Outbound::CalibrationSample {
                x: 640.0,
                y: 480.0,
                kind: SampleKind::YCalib
            }]
        );
        assert!(session.mapper().is_confirmed());
    }

    #[test]
    fn test_save_disarms_and_fits() {
        let mut session = Session::default();
        let output = session.tick(
            Instant::now(),
            &DeviceSnapshot::default(),
            &[],
            &[
                OperatorAction::ArmCalibration(SampleKind::XCalib),
                OperatorAction::SaveCalibration,
                OperatorAction::ClearCalibration,
                OperatorAction::PersistConfig,
            ],
        );
        assert_eq!(
            output.commands,
            vec![
                Outbound::CalibrationFit,
                Outbound::CalibrationClear,
                Outbound::SaveConfig
            ]
        );
        assert!(!session.calibration().is_armed());
    }

    #[test]
    fn test_config_saved_reply_reaches_status() {
        let mut session = Session::default();
        session.tick(
            Instant::now(),
            &DeviceSnapshot::default(),
            &[Report::ConfigSaved { success: false }],
            &[],
        );
        assert_eq!(session.calibration().status_text(), "Save Failed");
    }

    #[test]
    fn test_partial_reports_superimpose() {
        let mut session = Session::default();
        let output = session.tick(
            Instant::now(),
            &DeviceSnapshot::default(),
            &[
                Report::Link(true),
                Report::Status(StatusReport {
                    laser: Some(true),
                    ..StatusReport::default()
                }),
                Report::Status(StatusReport {
                    pan: Some(10.0),
                    ..StatusReport::default()
                }),
            ],
            &[],
        );
        assert!(output.state.connected);
        assert!(output.state.laser_on);
        assert_eq!(output.state.pan_deg, Some(10.0));
    }

    #[test]
    fn test_ticks_from_input_source() {
        let mut source = MockInputSource::new();
        source
            .expect_snapshot()
            .times(2)
            .returning(|| pad(0.0, -0.9));

        let mut session = Session::default();
        let t0 = Instant::now();
        let first = session.tick(t0, &source.snapshot(), &[], &[]);
        let second = session.tick(t0 + ms(5), &source.snapshot(), &[], &[]);
        assert_eq!(first.commands.len(), 1);
        assert!(second.commands.is_empty());
    }

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.input.min_emit_interval_ms = 100;
        config.frame.simulate_box = 20;

        let mut session = Session::from_config(&config);
        let t0 = Instant::now();
        assert_eq!(session.tick(t0, &pad(1.0, 0.0), &[], &[]).commands.len(), 1);
        assert!(session.tick(t0 + ms(50), &pad(1.0, 0.0), &[], &[]).commands.is_empty());

        let output = session.tick(t0 + ms(60), &DeviceSnapshot::default(), &[], &[click(1.0, 1.0)]);
        match &output.commands[..] {
            [Outbound::MockDetection { w, h, .. }] => assert_eq!((*w, *h), (20, 20)),
            other => panic!("Expected one mock detection, got: {:?}", other),
        }
    }
}
