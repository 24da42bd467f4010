//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::{ConsoleError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub link: LinkConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LinkConfig {
    #[serde(default = "default_address")]
    pub address: String,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

/// Local input configuration
#[derive(Debug, Deserialize, Clone)]
pub struct InputConfig {
    /// Gamepad evdev path, empty = auto-detect
    #[serde(default)]
    pub gamepad_path: String,

    /// Keyboard evdev path, empty = auto-detect
    #[serde(default)]
    pub keyboard_path: String,

    #[serde(default = "default_deadzone")]
    pub deadzone: f32,

    #[serde(default = "default_min_emit_interval_ms")]
    pub min_emit_interval_ms: u64,

    #[serde(default = "default_tick_rate_hz")]
    pub tick_rate_hz: u32,
}

/// Video frame configuration
#[derive(Debug, Deserialize, Clone)]
pub struct FrameConfig {
    #[serde(default = "default_fallback_width")]
    pub fallback_width: u32,

    #[serde(default = "default_fallback_height")]
    pub fallback_height: u32,

    /// Side length of the box sent with detection-simulation clicks
    #[serde(default = "default_simulate_box")]
    pub simulate_box: u32,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for rolling log files, empty = stderr only
    #[serde(default)]
    pub log_dir: String,
}

// Default value functions
fn default_address() -> String { "127.0.0.1:5001".to_string() }
fn default_connect_timeout_ms() -> u64 { 100 }

fn default_deadzone() -> f32 { 0.05 }
fn default_min_emit_interval_ms() -> u64 { 20 }
fn default_tick_rate_hz() -> u32 { 60 }

fn default_fallback_width() -> u32 { 640 }
fn default_fallback_height() -> u32 { 480 }
fn default_simulate_box() -> u32 { 50 }

fn default_log_level() -> String { "info".to_string() }

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            gamepad_path: String::new(),
            keyboard_path: String::new(),
            deadzone: default_deadzone(),
            min_emit_interval_ms: default_min_emit_interval_ms(),
            tick_rate_hz: default_tick_rate_hz(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            fallback_width: default_fallback_width(),
            fallback_height: default_fallback_height(),
            simulate_box: default_simulate_box(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use turret_console::config::Config;
    ///
    /// let config = Config::load("config/console.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration, falling back to defaults when the file does not exist
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.link.address.is_empty() {
            return Err(invalid("link address cannot be empty"));
        }

        if self.link.connect_timeout_ms == 0 || self.link.connect_timeout_ms > 10000 {
            return Err(invalid("connect_timeout_ms must be between 1 and 10000"));
        }

        if !(0.0..=0.25).contains(&self.input.deadzone) {
            return Err(invalid("deadzone must be between 0.0 and 0.25"));
        }

        if self.input.min_emit_interval_ms == 0 || self.input.min_emit_interval_ms > 1000 {
            return Err(invalid("min_emit_interval_ms must be between 1 and 1000"));
        }

        if ![30, 60, 120, 144].contains(&self.input.tick_rate_hz) {
            return Err(invalid("tick_rate_hz must be one of: 30, 60, 120, 144"));
        }

        if self.frame.fallback_width == 0 || self.frame.fallback_height == 0 {
            return Err(invalid("fallback frame size must be non-zero"));
        }

        if self.frame.simulate_box == 0 {
            return Err(invalid("simulate_box must be greater than 0"));
        }

        if self.logging.level.parse::<tracing::Level>().is_err() {
            return Err(invalid(format!(
                "unknown log level '{}' (expected trace, debug, info, warn or error)",
                self.logging.level
            )));
        }

        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> ConsoleError {
    ConsoleError::ConfigValue(msg.into())
}
