//! # Operator Console Module
//!
//! Text commands for actions that have no device binding, read one per line
//! from stdin.
//!
//! | Command | Action |
//! |---------|--------|
//! | `click <x> <y> <display_w> <display_h>` | Pointer click on the video |
//! | `calib x` / `calib y` | Arm calibration for one sample |
//! | `save` | Fit samples and disarm |
//! | `clear` | Discard collected samples |
//! | `persist` | Persist turret configuration |
//! | `mode` | Toggle auto mode |

use clap::{Parser, Subcommand, ValueEnum};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{ConsoleError, Result};
use crate::remote::protocol::SampleKind;
use crate::session::OperatorAction;
use crate::view::calibration::PointerClick;

/// One console line
#[derive(Parser, Debug)]
#[command(name = "console", no_binary_name = true, disable_version_flag = true)]
struct ConsoleLine {
    #[command(subcommand)]
    command: ConsoleCommand,
}

#[derive(Subcommand, Debug)]
enum ConsoleCommand {
    /// Pointer click on the video, in display pixels
    #[command(allow_negative_numbers = true)]
    Click {
        #[arg(value_parser = finite)]
        x: f64,
        #[arg(value_parser = finite)]
        y: f64,
        /// Display box width
        #[arg(value_parser = finite)]
        display_w: f64,
        /// Display box height
        #[arg(value_parser = finite)]
        display_h: f64,
    },

    /// Arm calibration for one sample
    Calib {
        #[arg(value_enum, ignore_case = true)]
        axis: CalibAxis,
    },

    /// Fit collected samples and disarm
    Save,

    /// Discard collected samples
    Clear,

    /// Persist turret configuration
    Persist,

    /// Toggle auto mode
    Mode,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum CalibAxis {
    /// Fix tilt, click points
    X,
    /// Fix pan, click points
    Y,
}

impl From<ConsoleCommand> for OperatorAction {
    fn from(command: ConsoleCommand) -> Self {
        match command {
            ConsoleCommand::Click {
                x,
                y,
                display_w,
                display_h,
            } => OperatorAction::Click(PointerClick {
                x,
                y,
                display_w,
                display_h,
            }),
            ConsoleCommand::Calib { axis: CalibAxis::X } => {
                OperatorAction::ArmCalibration(SampleKind::XCalib)
            }
            ConsoleCommand::Calib { axis: CalibAxis::Y } => {
                OperatorAction::ArmCalibration(SampleKind::YCalib)
            }
            ConsoleCommand::Save => OperatorAction::SaveCalibration,
            ConsoleCommand::Clear => OperatorAction::ClearCalibration,
            ConsoleCommand::Persist => OperatorAction::PersistConfig,
            ConsoleCommand::Mode => OperatorAction::ToggleMode,
        }
    }
}

fn finite(word: &str) -> std::result::Result<f64, String> {
    word.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| format!("'{}' is not a number", word))
}

/// Parse one console line
///
/// # Errors
///
/// Returns `Command` error for unknown commands or bad arguments. `help`
/// also comes back as an error carrying the usage text.
///
/// # Examples
///
/// ```
/// use turret_console::console::parse_command;
/// use turret_console::session::OperatorAction;
///
/// assert_eq!(parse_command("save")?, OperatorAction::SaveCalibration);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn parse_command(line: &str) -> Result<OperatorAction> {
    let parsed = ConsoleLine::try_parse_from(line.split_whitespace())
        .map_err(|e| ConsoleError::Command(e.to_string().trim_end().to_string()))?;
    Ok(parsed.command.into())
}

/// Spawn the stdin reader
///
/// Bad lines are logged and skipped. The task ends at end of input.
pub fn spawn_stdin() -> (mpsc::UnboundedReceiver<OperatorAction>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();

    let handle = tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_command(&line) {
                        Ok(action) => {
                            debug!("Console action: {:?}", action);
                            if tx.send(action).is_err() {
                                return;
                            }
                        }
                        Err(e) => warn!("{}", e),
                    }
                }
                Ok(None) => return,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    return;
                }
            }
        }
    });

    (rx, handle)
}
