//! # Control Module
//!
//! Arbitration between input sources and command rate limiting.

pub mod arbiter;
