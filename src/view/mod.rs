//! # View Module
//!
//! Pointer interaction with the video surface.
//!
//! This module handles:
//! - Mapping display pixels to frame pixels
//! - Routing clicks to calibration sampling or detection simulation

pub mod calibration;
pub mod coords;
