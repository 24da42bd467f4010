//! # State Module
//!
//! Canonical view of the turret built from its status reports.

pub mod reconciler;
