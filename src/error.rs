//! # Error Types
//!
//! Custom error types for Turret Console using `thiserror`.

use thiserror::Error;

/// Main error type for Turret Console
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// Configuration file parse errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    ConfigValue(String),

    /// Input device errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No usable gamepad or keyboard found
    #[error("No input device found")]
    ControllerNotFound,

    /// Remote link errors
    #[error("Link error: {0}")]
    Link(String),

    /// Unparseable operator console command
    #[error("Invalid command: {0}")]
    Command(String),

    /// Wire JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turret Console
pub type Result<T> = std::result::Result<T, ConsoleError>;
