//! # Command Arbiter Module
//!
//! Decides which sampled input, if any, becomes an outbound command.
//!
//! ## Axis Commands
//!
//! An axis sample is turned into a `joystick_control` command only when:
//! 1. The turret is in [`Mode::Manual`]
//! 2. No command was emitted within the last minimum interval (20ms by
//!    default), measured from the previous emission
//! 3. The sample is outside the deadzone on at least one axis
//!
//! Rejected samples are dropped, never queued. Only the live input matters
//! for a continuous control signal.
//!
//! When the gamepad and the keyboard are both live on the same tick, the
//! gamepad wins.
//!
//! ## Button Commands
//!
//! Button events are never rate-limited and are accepted in any mode.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::controller::sampler::{AxisSample, ButtonEvent, SampleFrame};
use crate::remote::protocol::{Mode, Outbound};

/// Default deadzone applied to both axes
pub const DEFAULT_DEADZONE: f32 = 0.05;

/// Default minimum time between two axis commands (50Hz ceiling)
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(20);

/// Pan/tilt rate command, each axis in -1.0..=1.0
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCommand {
    pub pan_axis: f32,
    pub tilt_axis: f32,
}

impl From<AxisCommand> for Outbound {
    fn from(command: AxisCommand) -> Self {
        Outbound::JoystickControl {
            pan_axis: command.pan_axis,
            tilt_axis: command.tilt_axis,
        }
    }
}

/// Rate-limits and prioritizes operator input
#[derive(Debug, Clone)]
pub struct CommandArbiter {
    deadzone: f32,
    min_interval: Duration,
    last_emit: Option<Instant>,
}

impl Default for CommandArbiter {
    fn default() -> Self {
        Self::new(DEFAULT_DEADZONE, DEFAULT_MIN_INTERVAL)
    }
}

impl CommandArbiter {
    /// Creates an arbiter
    ///
    /// # Arguments
    ///
    /// * `deadzone` - Per-axis magnitude treated as no input. Clamped to 0.0..=0.25.
    /// * `min_interval` - Minimum time between two axis commands
    #[must_use]
    pub fn new(deadzone: f32, min_interval: Duration) -> Self {
        Self {
            deadzone: deadzone.clamp(0.0, 0.25),
            min_interval,
            last_emit: None,
        }
    }

    #[must_use]
    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    #[must_use]
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Whether a sample carries real input.
    ///
    /// Non-finite values never count as input.
    #[must_use]
    pub fn is_live(&self, sample: &AxisSample) -> bool {
        if !sample.pan.is_finite() || !sample.tilt.is_finite() {
            return false;
        }
        sample.pan.abs() > self.deadzone || sample.tilt.abs() > self.deadzone
    }

    fn window_open(&self, now: Instant) -> bool {
        match self.last_emit {
            Some(last) => now.saturating_duration_since(last) >= self.min_interval,
            None => true,
        }
    }

    /// Submit a single axis sample
    ///
    /// Returns the command to emit, or `None` if the sample was rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::{Duration, Instant};
    /// use turret_console::control::arbiter::CommandArbiter;
    /// use turret_console::controller::sampler::{AxisSample, AxisSource};
    /// use turret_console::remote::protocol::Mode;
    ///
    /// let mut arbiter = CommandArbiter::default();
    /// let sample = AxisSample { source: AxisSource::Gamepad, pan: 0.5, tilt: 0.0 };
    /// let t0 = Instant::now();
    ///
    /// assert!(arbiter.submit(&sample, Mode::Manual, t0).is_some());
    /// assert!(arbiter.submit(&sample, Mode::Manual, t0 + Duration::from_millis(5)).is_none());
    /// assert!(arbiter.submit(&sample, Mode::Manual, t0 + Duration::from_millis(20)).is_some());
    /// ```
    pub fn submit(&mut self, sample: &AxisSample, mode: Mode, now: Instant) -> Option<AxisCommand> {
        if mode != Mode::Manual {
            return None;
        }
        if !self.window_open(now) || !self.is_live(sample) {
            return None;
        }

        self.last_emit = Some(now);
        let command = AxisCommand {
            pan_axis: sample.pan.clamp(-1.0, 1.0),
            tilt_axis: sample.tilt.clamp(-1.0, 1.0),
        };
        debug!(
            "Axis command from {:?}: pan={:.3} tilt={:.3}",
            sample.source, command.pan_axis, command.tilt_axis
        );
        Some(command)
    }

    /// Pick between the gamepad and keyboard samples of one tick and submit
    /// the winner
    ///
    /// The gamepad wins whenever it is live; the keyboard is the fallback.
    pub fn arbitrate(&mut self, frame: &SampleFrame, mode: Mode, now: Instant) -> Option<AxisCommand> {
        let chosen = [frame.gamepad, frame.keyboard]
            .into_iter()
            .flatten()
            .find(|sample| self.is_live(sample))?;

        self.submit(&chosen, mode, now)
    }

    /// Translate a button event into a command
    ///
    /// `ToggleMode` asks for the opposite of `mode`. [`ButtonEvent::Auxiliary`]
    /// is not bound and yields nothing.
    #[must_use]
    pub fn submit_button(&self, event: ButtonEvent, mode: Mode) -> Option<Outbound> {
        match event {
            ButtonEvent::ToggleLaser => Some(Outbound::ToggleLaser),
            ButtonEvent::ToggleMode => Some(Outbound::SetMode {
                mode: mode.toggled(),
            }),
            ButtonEvent::Auxiliary => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::sampler::AxisSource;

    fn pad(pan: f32, tilt: f32) -> AxisSample {
        AxisSample {
            source: AxisSource::Gamepad,
            pan,
            tilt,
        }
    }

    fn keys(pan: f32, tilt: f32) -> AxisSample {
        AxisSample {
            source: AxisSource::Keyboard,
            pan,
            tilt,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_deadzone_rejects_small_input() {
        let mut arbiter = CommandArbiter::default();
        let t0 = Instant::now();
        for (i, &(pan, tilt)) in [(0.0, 0.0), (0.05, -0.05), (-0.03, 0.04), (0.049, 0.0)]
            .iter()
            .enumerate()
        {
            let now = t0 + ms(100 * i as u64);
            assert!(arbiter.submit(&pad(pan, tilt), Mode::Manual, now).is_none());
        }
    }

    #[test]
    fn test_single_axis_outside_deadzone_is_live() {
        let mut arbiter = CommandArbiter::default();
        let command = arbiter.submit(&pad(0.0, -0.06), Mode::Manual, Instant::now());
        assert_eq!(
            command,
            Some(AxisCommand {
                pan_axis: 0.0,
                tilt_axis: -0.06
            })
        );
    }

    #[test]
    fn test_deadzone_sample_does_not_touch_window() {
        let mut arbiter = CommandArbiter::default();
        let t0 = Instant::now();
        assert!(arbiter.submit(&pad(0.5, 0.0), Mode::Manual, t0).is_some());
        // Idle sample inside the window is ignored, window still measured from t0
        assert!(arbiter.submit(&pad(0.0, 0.0), Mode::Manual, t0 + ms(15)).is_none());
        assert!(arbiter.submit(&pad(0.5, 0.0), Mode::Manual, t0 + ms(20)).is_some());
    }

    #[test]
    fn test_rate_limit_under_fast_ticks() {
        let mut arbiter = CommandArbiter::default();
        let t0 = Instant::now();
        let emitted: Vec<u64> = (0..100u64)
            .filter(|&i| {
                arbiter
                    .submit(&pad(1.0, 0.0), Mode::Manual, t0 + ms(i * 3))
                    .is_some()
            })
            .map(|i| i * 3)
            .collect();

        for pair in emitted.windows(2) {
            assert!(pair[1] - pair[0] >= 20, "Emissions too close: {:?}", pair);
        }
        assert_eq!(emitted[0], 0);
        assert_eq!(emitted[1], 21);
    }

    #[test]
    fn test_dropped_samples_are_not_queued() {
        let mut arbiter = CommandArbiter::default();
        let t0 = Instant::now();
        assert!(arbiter.submit(&pad(1.0, 0.0), Mode::Manual, t0).is_some());
        assert!(arbiter.submit(&pad(-1.0, 0.0), Mode::Manual, t0 + ms(10)).is_none());
        // The dropped sample does not resurface once the window opens
        let next = arbiter.submit(&pad(0.3, 0.3), Mode::Manual, t0 + ms(25));
        assert_eq!(next.map(|c| c.pan_axis), Some(0.3));
    }

    #[test]
    fn test_auto_mode_rejects_axes() {
        let mut arbiter = CommandArbiter::default();
        let t0 = Instant::now();
        assert!(arbiter.submit(&pad(1.0, 1.0), Mode::Auto, t0).is_none());
        // Rejection does not start a window
        assert!(arbiter.submit(&pad(1.0, 1.0), Mode::Manual, t0 + ms(1)).is_some());
    }

    #[test]
    fn test_gamepad_wins_over_keyboard() {
        let mut arbiter = CommandArbiter::default();
        let frame = SampleFrame {
            gamepad: Some(pad(0.4, -0.2)),
            keyboard: Some(keys(-1.0, 1.0)),
            buttons: vec![],
        };
        let command = arbiter.arbitrate(&frame, Mode::Manual, Instant::now()).unwrap();
        assert_eq!(
            command,
            AxisCommand {
                pan_axis: 0.4,
                tilt_axis: -0.2
            }
        );
    }

    #[test]
    fn test_keyboard_used_when_gamepad_idle() {
        let mut arbiter = CommandArbiter::default();
        let frame = SampleFrame {
            gamepad: Some(pad(0.01, 0.0)),
            keyboard: Some(keys(1.0, 0.0)),
            buttons: vec![],
        };
        let command = arbiter.arbitrate(&frame, Mode::Manual, Instant::now()).unwrap();
        assert_eq!(command.pan_axis, 1.0);
    }

    #[test]
    fn test_cancelled_keys_emit_nothing() {
        let mut arbiter = CommandArbiter::default();
        let frame = SampleFrame {
            gamepad: None,
            keyboard: Some(keys(0.0, 0.0)),
            buttons: vec![],
        };
        assert!(arbiter.arbitrate(&frame, Mode::Manual, Instant::now()).is_none());
    }

    #[test]
    fn test_non_finite_sample_rejected() {
        let mut arbiter = CommandArbiter::default();
        assert!(arbiter.submit(&pad(f32::NAN, 0.0), Mode::Manual, Instant::now()).is_none());
        assert!(arbiter
            .submit(&pad(f32::INFINITY, 0.0), Mode::Manual, Instant::now())
            .is_none());
    }

    #[test]
    fn test_out_of_range_clamped() {
        let mut arbiter = CommandArbiter::default();
        let command = arbiter.submit(&pad(1.5, -2.0), Mode::Manual, Instant::now()).unwrap();
        assert_eq!(command.pan_axis, 1.0);
        assert_eq!(command.tilt_axis, -1.0);
    }

    #[test]
    fn test_buttons_not_rate_limited() {
        let mut arbiter = CommandArbiter::default();
        let t0 = Instant::now();
        assert!(arbiter.submit(&pad(1.0, 0.0), Mode::Manual, t0).is_some());
        assert_eq!(
            arbiter.submit_button(ButtonEvent::ToggleLaser, Mode::Manual),
            Some(Outbound::ToggleLaser)
        );
        assert_eq!(
            arbiter.submit_button(ButtonEvent::ToggleLaser, Mode::Auto),
            Some(Outbound::ToggleLaser)
        );
    }

    #[test]
    fn test_toggle_mode_requests_opposite() {
        let arbiter = CommandArbiter::default();
        assert_eq!(
            arbiter.submit_button(ButtonEvent::ToggleMode, Mode::Manual),
            Some(Outbound::SetMode { mode: Mode::Auto })
        );
        assert_eq!(
            arbiter.submit_button(ButtonEvent::ToggleMode, Mode::Auto),
            Some(Outbound::SetMode { mode: Mode::Manual })
        );
        assert_eq!(arbiter.submit_button(ButtonEvent::Auxiliary, Mode::Manual), None);
    }

    #[test]
    fn test_deadzone_clamped() {
        assert_eq!(CommandArbiter::new(0.9, DEFAULT_MIN_INTERVAL).deadzone(), 0.25);
        assert_eq!(CommandArbiter::new(-1.0, DEFAULT_MIN_INTERVAL).deadzone(), 0.0);
    }

    #[test]
    fn test_axis_command_into_outbound() {
        let outbound: Outbound = AxisCommand {
            pan_axis: 0.25,
            tilt_axis: -0.5,
        }
        .into();
        assert_eq!(
            outbound,
            Outbound::JoystickControl {
                pan_axis: 0.25,
                tilt_axis: -0.5
            }
        );
    }
}
