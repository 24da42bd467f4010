//! # Input Device Module
//!
//! Detects gamepad and keyboard devices through the Linux evdev interface and
//! keeps a live snapshot of each one.
//!
//! ## Device Detection
//!
//! Devices under `/dev/input/event*` are scanned in path order:
//! - Gamepad: reports `BTN_SOUTH` and `ABS_X`
//! - Keyboard: reports `KEY_W` and `KEY_SPACE`
//!
//! Each device is read by its own task. A device that disappears is searched
//! for again after a retry interval, so controllers can be hot-plugged.

use evdev::{AbsoluteAxisType, AttributeSetRef, Device, Key};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::input::{AxisRange, DeviceSnapshot, GamepadMapper, GamepadSnapshot, KeyState, KeyboardMapper};
use crate::config::InputConfig;
use crate::error::{ConsoleError, Result};

/// Delay between device searches while a device is missing
pub const DEVICE_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Source of per-tick device snapshots
#[cfg_attr(test, mockall::automock)]
pub trait InputSource {
    /// Current state of every input device
    fn snapshot(&self) -> DeviceSnapshot;
}

/// What an input device is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceRole {
    Gamepad,
    Keyboard,
}

/// Classify a device by its capabilities
///
/// Gamepads are checked first since many of them also expose a few keyboard
/// keys.
#[must_use]
pub fn role_for(
    keys: Option<&AttributeSetRef<Key>>,
    axes: Option<&AttributeSetRef<AbsoluteAxisType>>,
) -> Option<DeviceRole> {
    let keys = keys?;

    let has_stick = axes.map_or(false, |axes| axes.contains(AbsoluteAxisType::ABS_X));
    if keys.contains(Key::BTN_SOUTH) && has_stick {
        return Some(DeviceRole::Gamepad);
    }

    if keys.contains(Key::KEY_W) && keys.contains(Key::KEY_SPACE) {
        return Some(DeviceRole::Keyboard);
    }

    None
}

/// Open the device at `path` if it has the requested role
fn open_as(path: &Path, role: DeviceRole) -> Result<Device> {
    let device = Device::open(path)
        .map_err(|e| ConsoleError::Controller(format!("Failed to open {}: {}", path.display(), e)))?;

    match role_for(device.supported_keys(), device.supported_absolute_axes()) {
        Some(found) if found == role => Ok(device),
        _ => Err(ConsoleError::Controller(format!(
            "{} is not a {:?}",
            path.display(),
            role
        ))),
    }
}

/// Find the first device with the given role
///
/// Uses `configured_path` when non-empty, otherwise scans `/dev/input`.
///
/// # Errors
///
/// - `ControllerNotFound`: no matching device
/// - `Controller`: the configured device cannot be opened or has the wrong role
pub fn find_device(role: DeviceRole, configured_path: &str) -> Result<(PathBuf, Device)> {
    if !configured_path.is_empty() {
        let path = PathBuf::from(configured_path);
        let device = open_as(&path, role)?;
        return Ok((path, device));
    }

    let input_dir = Path::new("/dev/input");

    if !input_dir.exists() {
        return Err(ConsoleError::Controller(
            "/dev/input directory not found".to_string(),
        ));
    }

    let mut entries: Vec<PathBuf> = std::fs::read_dir(input_dir)
        .map_err(|e| ConsoleError::Controller(format!("Failed to read /dev/input: {}", e)))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| {
            path.file_name()
                .map_or(false, |name| name.to_string_lossy().starts_with("event"))
        })
        .collect();

    // Deterministic selection when several devices match
    entries.sort();

    for path in entries {
        match open_as(&path, role) {
            Ok(device) => {
                info!(
                    "Found {:?} at {} ({})",
                    role,
                    path.display(),
                    device.name().unwrap_or("unnamed")
                );
                return Ok((path, device));
            }
            Err(e) => debug!("Skipping {}: {}", path.display(), e),
        }
    }

    Err(ConsoleError::ControllerNotFound)
}

/// [`find_device`] on the blocking thread pool
///
/// Directory scans and device opens are synchronous syscalls and stay off the
/// runtime workers.
pub async fn locate_device(role: DeviceRole, configured_path: &str) -> Result<(PathBuf, Device)> {
    let configured_path = configured_path.to_string();
    tokio::task::spawn_blocking(move || find_device(role, &configured_path))
        .await
        .map_err(|e| ConsoleError::Controller(format!("{:?} search task failed: {}", role, e)))?
}

/// Stick ranges as reported by the device
fn stick_ranges(device: &Device) -> (AxisRange, AxisRange) {
    match device.get_abs_state() {
        Ok(state) => {
            let x = state[AbsoluteAxisType::ABS_X.0 as usize];
            let y = state[AbsoluteAxisType::ABS_Y.0 as usize];
            (
                AxisRange::new(x.minimum, x.maximum),
                AxisRange::new(y.minimum, y.maximum),
            )
        }
        Err(e) => {
            warn!("Could not read stick ranges, assuming 0-255: {}", e);
            (AxisRange::default(), AxisRange::default())
        }
    }
}

/// Snapshots published by the device tasks
#[derive(Debug, Clone)]
pub struct WatchedInput {
    gamepad: watch::Receiver<Option<GamepadSnapshot>>,
    keys: watch::Receiver<KeyState>,
}

impl InputSource for WatchedInput {
    fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            gamepad: *self.gamepad.borrow(),
            keys: *self.keys.borrow(),
        }
    }
}

/// Spawn gamepad and keyboard reader tasks
///
/// Neither device is required: a missing gamepad reads as `None`, a missing
/// keyboard as no keys held.
pub fn spawn_input(config: &InputConfig) -> (WatchedInput, Vec<JoinHandle<()>>) {
    let (gamepad_tx, gamepad_rx) = watch::channel(None);
    let (keys_tx, keys_rx) = watch::channel(KeyState::default());

    let handles = vec![
        tokio::spawn(run_gamepad(config.gamepad_path.clone(), gamepad_tx)),
        tokio::spawn(run_keyboard(config.keyboard_path.clone(), keys_tx)),
    ];

    (
        WatchedInput {
            gamepad: gamepad_rx,
            keys: keys_rx,
        },
        handles,
    )
}

async fn run_gamepad(configured_path: String, tx: watch::Sender<Option<GamepadSnapshot>>) {
    loop {
        match locate_device(DeviceRole::Gamepad, &configured_path).await {
            Ok((path, device)) => {
                let (x_range, y_range) = stick_ranges(&device);
                let mut mapper = GamepadMapper::new(x_range, y_range);
                tx.send_replace(Some(mapper.snapshot()));

                match device.into_event_stream() {
                    Ok(mut stream) => loop {
                        match stream.next_event().await {
                            Ok(event) => {
                                mapper.process_event(&event);
                                tx.send_replace(Some(mapper.snapshot()));
                            }
                            Err(e) => {
                                warn!("Gamepad {} disconnected: {}", path.display(), e);
                                break;
                            }
                        }
                    },
                    Err(e) => warn!("Failed to stream {}: {}", path.display(), e),
                }

                tx.send_replace(None);
            }
            Err(e) => debug!("No gamepad: {}", e),
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(DEVICE_RETRY_INTERVAL).await;
    }
}

async fn run_keyboard(configured_path: String, tx: watch::Sender<KeyState>) {
    loop {
        match locate_device(DeviceRole::Keyboard, &configured_path).await {
            Ok((path, device)) => {
                let mut mapper = KeyboardMapper::new();

                match device.into_event_stream() {
                    Ok(mut stream) => loop {
                        match stream.next_event().await {
                            Ok(event) => {
                                mapper.process_event(&event);
                                tx.send_if_modified(|state| {
                                    let changed = *state != mapper.state();
                                    *state = mapper.state();
                                    changed
                                });
                            }
                            Err(e) => {
                                warn!("Keyboard {} disconnected: {}", path.display(), e);
                                break;
                            }
                        }
                    },
                    Err(e) => warn!("Failed to stream {}: {}", path.display(), e),
                }

                mapper.reset();
                tx.send_replace(KeyState::default());
            }
            Err(e) => debug!("No keyboard: {}", e),
        }

        if tx.is_closed() {
            return;
        }
        tokio::time::sleep(DEVICE_RETRY_INTERVAL).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::AttributeSet;

    fn key_set(keys: &[Key]) -> AttributeSet<Key> {
        let mut set = AttributeSet::<Key>::new();
        for &key in keys {
            set.insert(key);
        }
        set
    }

    fn axis_set(axes: &[AbsoluteAxisType]) -> AttributeSet<AbsoluteAxisType> {
        let mut set = AttributeSet::<AbsoluteAxisType>::new();
        for &axis in axes {
            set.insert(axis);
        }
        set
    }

    #[test]
    fn test_role_gamepad() {
        let keys = key_set(&[Key::BTN_SOUTH, Key::BTN_EAST]);
        let axes = axis_set(&[AbsoluteAxisType::ABS_X, AbsoluteAxisType::ABS_Y]);
        assert_eq!(role_for(Some(&*keys), Some(&*axes)), Some(DeviceRole::Gamepad));
    }

    #[test]
    fn test_role_gamepad_needs_stick() {
        let keys = key_set(&[Key::BTN_SOUTH]);
        assert_eq!(role_for(Some(&*keys), None), None);
    }

    #[test]
    fn test_role_keyboard() {
        let keys = key_set(&[Key::KEY_W, Key::KEY_A, Key::KEY_SPACE]);
        assert_eq!(role_for(Some(&*keys), None), Some(DeviceRole::Keyboard));
    }

    #[test]
    fn test_role_no_keys() {
        let axes = axis_set(&[AbsoluteAxisType::ABS_X]);
        assert_eq!(role_for(None, Some(&*axes)), None);
    }

    #[test]
    fn test_role_mouse_like_device() {
        let keys = key_set(&[Key::BTN_LEFT, Key::BTN_RIGHT]);
        assert_eq!(role_for(Some(&*keys), None), None);
    }

    #[test]
    fn test_configured_path_missing() {
        let result = find_device(DeviceRole::Gamepad, "/dev/input/nonexistent_event_12345");
        match result {
            Err(ConsoleError::Controller(msg)) => assert!(msg.contains("nonexistent_event_12345")),
            other => panic!("Expected Controller error, got: {:?}", other.map(|(p, _)| p)),
        }
    }

    #[tokio::test]
    async fn test_locate_device_reports_open_error() {
        let result = locate_device(DeviceRole::Keyboard, "/dev/input/nonexistent_event_12345").await;
        match result {
            Err(ConsoleError::Controller(msg)) => assert!(msg.contains("nonexistent_event_12345")),
            other => panic!("Expected Controller error, got: {:?}", other.map(|(p, _)| p)),
        }
    }

    #[tokio::test]
    async fn test_watched_input_reads_latest() {
        let (gamepad_tx, gamepad_rx) = watch::channel(None);
        let (keys_tx, keys_rx) = watch::channel(KeyState::default());
        let input = WatchedInput {
            gamepad: gamepad_rx,
            keys: keys_rx,
        };
        assert_eq!(input.snapshot(), DeviceSnapshot::default());

        gamepad_tx.send_replace(Some(GamepadSnapshot {
            pan: 0.5,
            ..GamepadSnapshot::default()
        }));
        keys_tx.send_replace(KeyState {
            left: true,
            ..KeyState::default()
        });

        let snapshot = input.snapshot();
        assert_eq!(snapshot.gamepad.map(|g| g.pan), Some(0.5));
        assert!(snapshot.keys.left);
    }

    // Integration test - only runs with real hardware
    #[test]
    #[ignore]
    fn test_find_gamepad_with_real_hardware() {
        let (path, device) = find_device(DeviceRole::Gamepad, "").expect("Gamepad not found");
        assert!(path.to_string_lossy().starts_with("/dev/input/event"));
        assert!(device.name().is_some());
    }
}
