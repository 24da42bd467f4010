//! # Controller Module
//!
//! Local operator input handling.
//!
//! This module handles:
//! - Gamepad and keyboard detection via evdev
//! - Folding raw events into per-device snapshots
//! - Sampling snapshots once per tick into axis samples and button edges

pub mod devices;
pub mod input;
pub mod sampler;
