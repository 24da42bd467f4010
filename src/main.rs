//! # Turret Console
//!
//! Aim a pan/tilt laser turret with a gamepad or keyboard.
//!
//! This application samples local input devices at a fixed tick rate, sends
//! rate-limited joystick commands to the turret host and keeps a reconciled
//! view of the turret's state.

use anyhow::{Context, Result};
use clap::Parser;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use turret_console::config::{Config, LinkConfig, LoggingConfig};
use turret_console::console::spawn_stdin;
use turret_console::controller::devices::{spawn_input, InputSource};
use turret_console::remote::decoder::Report;
use turret_console::remote::protocol::Outbound;
use turret_console::remote::{spawn_reader, spawn_writer, TcpLink};
use turret_console::session::Session;
use turret_console::state::reconciler::RemoteState;

/// Config file read when no path is given
const DEFAULT_CONFIG_PATH: &str = "turret-console.toml";

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "turret-console")]
#[command(version, about = "Pan/tilt laser turret operator console", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,
}

/// Delay between turret connection attempts
const LINK_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// File name prefix of rolling log files
const LOG_FILE_PREFIX: &str = "turret-console.log";

/// Main entry point for Turret Console
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Parse arguments (`turret-console [--config PATH] [--log-level LEVEL]`)
///    - Load configuration, apply the log level override
///    - Set up logging, optionally with a rolling log file
///    - Spawn device readers, the stdin console and the turret link
///
/// 2. **Main Loop**
///    - Every tick: drain reports and console actions, sample devices, run
///      the session and queue its commands on the link
///    - Log the HUD line when it changes
///    - Handle Ctrl+C for graceful shutdown
///
/// # Errors
///
/// Returns error if the configuration cannot be loaded or is invalid
#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    let _log_guard = init_logging(&config.logging)?;

    info!("Turret Console v{} starting...", env!("CARGO_PKG_VERSION"));
    debug!("Configuration: {:?}", config);

    let (input, _device_tasks) = spawn_input(&config.input);
    let (mut action_rx, _stdin_task) = spawn_stdin();

    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<Outbound>();
    let (report_tx, mut report_rx) = mpsc::unbounded_channel::<Report>();
    let link_task = tokio::spawn(run_link(config.link.clone(), outbound_rx, report_tx));

    let mut session = Session::from_config(&config);
    let (state_tx, state_rx) = watch::channel(session.state().clone());
    let hud_task = tokio::spawn(run_hud(state_rx));

    let period = Duration::from_micros(1_000_000 / u64::from(config.input.tick_rate_hz));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Ticking at {}Hz, link {}", config.input.tick_rate_hz, config.link.address);
    info!("Press Ctrl+C to exit");

    let mut commands_sent: u64 = 0;
    let mut calibration_status = session.calibration().status_text().to_string();

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reports = drain(&mut report_rx);
                let actions = drain(&mut action_rx);

                let output = session.tick(Instant::now(), &input.snapshot(), &reports, &actions);

                for command in output.commands {
                    if outbound_tx.send(command).is_err() {
                        warn!("Link task stopped, dropping command");
                        continue;
                    }
                    commands_sent += 1;
                }

                state_tx.send_if_modified(|state| {
                    if *state == output.state {
                        false
                    } else {
                        *state = output.state;
                        true
                    }
                });

                let status = session.calibration().status_text();
                if status != calibration_status {
                    info!("Calibration: {}", status);
                    calibration_status = status.to_string();
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                info!("Total commands queued: {}", commands_sent);
                break;
            }
        }
    }

    drop(outbound_tx);
    drop(state_tx);
    if let Err(e) = link_task.await {
        warn!("Link task failed: {}", e);
    }
    hud_task.abort();

    Ok(())
}

/// Load the configuration file and apply command line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::load_or_default(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config))?;

    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
        config.validate().context("Invalid --log-level")?;
    }

    Ok(config)
}

/// Install the tracing subscriber
///
/// `RUST_LOG` overrides the configured level. The returned guard flushes the
/// log file and must live until exit.
fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("Invalid log level")?;

    let (file_layer, guard) = if logging.log_dir.is_empty() {
        (None, None)
    } else {
        let appender = tracing_appender::rolling::daily(&logging.log_dir, LOG_FILE_PREFIX);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Keep a turret connection up
///
/// Commands queued while disconnected are dropped. Returns when the console
/// drops its outbound sender.
async fn run_link(
    config: LinkConfig,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    reports: mpsc::UnboundedSender<Report>,
) {
    let timeout = Duration::from_millis(config.connect_timeout_ms);
    let mut warned = false;

    loop {
        match TcpLink::connect(&config.address, timeout).await {
            Ok((link, reader)) => {
                warned = false;
                let (link_tx, writer_task) = spawn_writer(link);
                let (mut report_rx, reader_task) = spawn_reader(reader);

                let shutdown = loop {
                    tokio::select! {
                        message = outbound.recv() => match message {
                            Some(message) => {
                                if link_tx.send(message).is_err() {
                                    warn!("Writer task stopped");
                                }
                            }
                            None => break true,
                        },
                        report = report_rx.recv() => match report {
                            Some(report) => {
                                if reports.send(report).is_err() {
                                    break true;
                                }
                            }
                            None => break false,
                        },
                    }
                };

                drop(link_tx);
                reader_task.abort();
                if let Err(e) = writer_task.await {
                    warn!("Writer task failed: {}", e);
                }

                if shutdown {
                    return;
                }
            }
            Err(e) if !warned => {
                warn!("{}, retrying every {:?}", e, LINK_RETRY_INTERVAL);
                warned = true;
            }
            Err(e) => debug!("{}", e),
        }

        tokio::time::sleep(LINK_RETRY_INTERVAL).await;

        let mut dropped = 0usize;
        loop {
            match outbound.try_recv() {
                Ok(_) => dropped += 1,
                Err(mpsc::error::TryRecvError::Empty) => break,
                Err(mpsc::error::TryRecvError::Disconnected) => return,
            }
        }
        if dropped > 0 {
            debug!("Dropped {} commands while disconnected", dropped);
        }
    }
}

/// Log the HUD line whenever it changes
async fn run_hud(mut state_rx: watch::Receiver<RemoteState>) {
    let mut last_line = String::new();
    while state_rx.changed().await.is_ok() {
        let line = state_rx.borrow_and_update().hud_line();
        if line != last_line {
            info!("{}", line);
            last_line = line;
        }
    }
}

/// Take everything currently queued without waiting
fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut items = Vec::new();
    while let Ok(item) = rx.try_recv() {
        items.push(item);
    }
    items
}
