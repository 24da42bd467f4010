//! # Turret Console Library
//!
//! Operator console for a pan/tilt laser turret.
//!
//! This library provides the core functionality for turning gamepad and
//! keyboard input into rate-limited turret commands, mapping pointer clicks on
//! the video into frame coordinates for calibration, and reconciling the
//! turret's partial status reports into one display state.

pub mod config;
pub mod console;
pub mod control;
pub mod controller;
pub mod error;
pub mod remote;
pub mod session;
pub mod state;
pub mod view;
